//! The immutable parsed configuration handed to the root-set builder.

use crate::ast::{PackageObfuscationMode, Rule};

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub rules: Vec<Rule>,
    pub shrink: bool,
    pub obfuscate: bool,
    pub optimize: bool,
    pub package_obfuscation_mode: PackageObfuscationMode,
    pub package_prefix: Option<String>,
    pub attribute_removal_pattern: Option<String>,
    pub dictionaries: Vec<String>,
    pub inject_paths: Vec<String>,
    pub library_paths: Vec<String>,
    pub keep_package_names: Vec<String>,
    pub ignore_missing_classes: bool,
    pub ignore_warnings: bool,
    pub keep_inner_class: bool,
    pub dont_warn: Vec<String>,
}

impl Configuration {
    pub fn new() -> Self {
        Configuration {
            shrink: true,
            obfuscate: true,
            optimize: true,
            keep_inner_class: true,
            ..Default::default()
        }
    }
}
