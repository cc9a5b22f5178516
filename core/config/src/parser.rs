//! Parses a Proguard-syntax configuration buffer into a [`Configuration`].

use crate::ast::{
    AccessFlags, AccessMatcher, ClassTypeMatcher, InheritanceClause, MemberPattern, MemberRule,
    PackageObfuscationMode, Rule, RuleKind,
};
use crate::config::Configuration;
use crate::errors::ConfigError;
use crate::tokenizer::{Token, Tokenizer};

/// Options that take one argument and are silently ignored.
const IGNORED_SINGLE_ARG: &[&str] = &[
    "optimizations",
    "optimizationpasses",
    "renamesourcefileattribute",
    "target",
    "microedition",
];

/// Flag options (no argument) that are silently ignored.
const IGNORED_FLAG: &[&str] = &[
    "forceprocessing",
    "dontpreverify",
    "android",
    "skipnonpubliclibraryclasses",
    "dontusemixedcaseclassnames",
    "useuniqueclassmembernames",
    "verbose",
];

/// Options that take one argument, are unsupported, and are warned about.
const WARNED_SINGLE_ARG: &[&str] = &["applymapping", "obfuscationdictionary"];

/// Flag options that are rejected outright.
const UNSUPPORTED_FLAG: &[&str] = &["skipnonpubliclibraryclassmembers"];

pub struct Parser<'a> {
    tok: Tokenizer<'a>,
    file: String,
    lookahead: Option<Token>,
    config: Configuration,
}

impl<'a> Parser<'a> {
    pub fn new(file: &str, src: &'a str) -> Self {
        Parser {
            tok: Tokenizer::new(src),
            file: file.to_string(),
            lookahead: None,
            config: Configuration::new(),
        }
    }

    fn peek(&mut self) -> Token {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.tok.next_token());
        }
        self.lookahead.clone().unwrap()
    }

    fn bump(&mut self) -> Token {
        self.peek();
        self.lookahead.take().unwrap()
    }

    fn err(&mut self, message: impl std::fmt::Display) -> ConfigError {
        let pos = self.tok.pos();
        let snippet = self.tok.line_text(pos.line).to_string();
        ConfigError::parse(&self.file, pos.line, pos.column, &snippet, message)
    }

    fn expect_word(&mut self) -> Result<String, ConfigError> {
        match self.bump() {
            Token::Word(w) => Ok(w),
            other => Err(self.err(format!("expected a word, found {other:?}"))),
        }
    }

    /// Parse the whole buffer, merging rules and flags into `self.config`.
    pub fn parse(mut self) -> Result<Configuration, ConfigError> {
        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Word(w) if w.starts_with('-') => {
                    self.parse_option(&w[1..])?;
                }
                other => return Err(self.err(format!("expected an option, found {other:?}"))),
            }
        }
        Ok(self.config)
    }

    fn parse_option(&mut self, name: &str) -> Result<(), ConfigError> {
        self.bump(); // consume the `-option` word
        match name {
            "keep" => self.parse_rule(RuleKind::Keep)?,
            "keepclassmembers" => self.parse_rule(RuleKind::KeepClassMembers)?,
            "keepclasseswithmembers" => self.parse_rule(RuleKind::KeepClassesWithMembers)?,
            "whyareyoukeeping" => self.parse_rule(RuleKind::WhyAreYouKeeping)?,
            "keepnames" => self.parse_rule(RuleKind::Keep)?,
            "checkdiscard" => self.parse_rule(RuleKind::CheckDiscard)?,
            "assumenosideeffects" => self.parse_rule(RuleKind::AssumeNoSideEffects)?,
            "assumevalues" => self.parse_rule(RuleKind::AssumeValues)?,
            "alwaysinline" => self.parse_rule(RuleKind::AlwaysInline)?,
            "keeppackagenames" => {
                let pattern = self.expect_word()?;
                self.config.keep_package_names.push(pattern);
            }
            "dontwarn" => {
                if let Token::Word(w) = self.peek() {
                    self.bump();
                    self.config.dont_warn.push(w);
                }
            }
            "dontshrink" => self.config.shrink = false,
            "dontoptimize" => self.config.optimize = false,
            "dontobfuscate" => self.config.obfuscate = false,
            "ignorewarnings" => self.config.ignore_warnings = true,
            "dontskipnonpubliclibraryclasses" => {}
            "keepattributes" => {
                self.config.attribute_removal_pattern = Some(self.expect_word()?);
            }
            "repackageclasses" => {
                self.config.package_obfuscation_mode = PackageObfuscationMode::Repackage;
                if let Token::Word(w) = self.peek() {
                    self.bump();
                    self.config.package_prefix = Some(w);
                }
            }
            "flattenpackagehierarchy" => {
                self.config.package_obfuscation_mode = PackageObfuscationMode::Flatten;
                if let Token::Word(w) = self.peek() {
                    self.bump();
                    self.config.package_prefix = Some(w);
                }
            }
            "classobfuscationdictionary" | "packageobfuscationdictionary" | "obfuscationdictionary" => {
                self.config.dictionaries.push(self.expect_word()?);
            }
            "injars" => self.config.inject_paths.push(self.expect_word()?),
            "libraryjars" => self.config.library_paths.push(self.expect_word()?),
            "outjars" | "printmapping" | "printseeds" | "printusage" => {
                // Output-path options: consume their one argument, it is
                // the writer driver's concern, not the rule model's.
                if let Token::Word(_) = self.peek() {
                    self.bump();
                }
            }
            other if IGNORED_FLAG.contains(&other) => {}
            other if IGNORED_SINGLE_ARG.contains(&other) => {
                if let Token::Word(_) = self.peek() {
                    self.bump();
                }
            }
            other if WARNED_SINGLE_ARG.contains(&other) => {
                log::warn!("ignoring unsupported option -{other}");
                if let Token::Word(_) = self.peek() {
                    self.bump();
                }
            }
            other if UNSUPPORTED_FLAG.contains(&other) => {
                return Err(self.err(format!("unsupported option -{other}")));
            }
            other => {
                log::warn!("unrecognized option -{other}, ignoring");
                if matches!(self.peek(), Token::Word(w) if !w.starts_with('-')) {
                    self.bump();
                }
            }
        }
        Ok(())
    }

    fn parse_annotation(&mut self) -> Option<String> {
        if let Token::Word(w) = self.peek() {
            if let Some(stripped) = w.strip_prefix('@') {
                let name = stripped.to_string();
                self.bump();
                return Some(name);
            }
        }
        None
    }

    fn parse_access_matcher(&mut self) -> AccessMatcher {
        let mut matcher = AccessMatcher::default();
        loop {
            let (negated, word) = match self.peek() {
                Token::Not => {
                    self.bump();
                    match self.peek() {
                        Token::Word(w) => (true, w),
                        _ => break,
                    }
                }
                Token::Word(w) => (false, w),
                _ => break,
            };
            let flag = match word.as_str() {
                "public" => AccessFlags::PUBLIC,
                "private" => AccessFlags::PRIVATE,
                "protected" => AccessFlags::PROTECTED,
                "static" => AccessFlags::STATIC,
                "final" => AccessFlags::FINAL,
                "abstract" => AccessFlags::ABSTRACT,
                "synthetic" => AccessFlags::SYNTHETIC,
                "native" => AccessFlags::NATIVE,
                "volatile" => AccessFlags::VOLATILE,
                "transient" => AccessFlags::TRANSIENT,
                "strictfp" => AccessFlags::STRICTFP,
                _ => break,
            };
            self.bump();
            if negated {
                matcher.negated |= flag;
            } else {
                matcher.required |= flag;
            }
        }
        matcher
    }

    fn parse_class_type(&mut self) -> Result<ClassTypeMatcher, ConfigError> {
        match self.peek() {
            Token::Word(w) if w == "class" => {
                self.bump();
                Ok(ClassTypeMatcher::Class)
            }
            Token::Word(w) if w == "interface" => {
                self.bump();
                Ok(ClassTypeMatcher::Interface)
            }
            Token::Word(w) if w == "@interface" => {
                self.bump();
                Ok(ClassTypeMatcher::AnnotationType)
            }
            Token::Word(w) if w == "enum" => {
                self.bump();
                Ok(ClassTypeMatcher::Enum)
            }
            other => Err(self.err(format!(
                "expected `class`/`interface`/`@interface`/`enum`, found {other:?}"
            ))),
        }
    }

    fn parse_class_names(&mut self) -> Result<Vec<String>, ConfigError> {
        let mut names = Vec::new();
        loop {
            let negate = matches!(self.peek(), Token::Not);
            if negate {
                self.bump();
            }
            let mut name = self.expect_word()?;
            if negate {
                name.insert(0, '!');
            }
            names.push(name);
            if matches!(self.peek(), Token::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        Ok(names)
    }

    fn parse_inheritance(&mut self) -> Result<Option<InheritanceClause>, ConfigError> {
        let is_extends = match self.peek() {
            Token::Word(w) if w == "extends" => true,
            Token::Word(w) if w == "implements" => false,
            _ => return Ok(None),
        };
        self.bump();
        let annotation = self.parse_annotation();
        let name_pattern = self.expect_word()?;
        Ok(Some(InheritanceClause { is_extends, annotation, name_pattern }))
    }

    fn parse_member_rule(&mut self) -> Result<MemberRule, ConfigError> {
        let annotation = self.parse_annotation();
        let access = self.parse_access_matcher();
        let pattern = match self.peek() {
            Token::Word(w) if w == "*" => {
                self.bump();
                MemberPattern::All
            }
            Token::Word(w) if w == "<fields>" => {
                self.bump();
                MemberPattern::AllFields
            }
            Token::Word(w) if w == "<methods>" => {
                self.bump();
                MemberPattern::AllMethods
            }
            Token::Word(w) if w == "<init>" => {
                self.bump();
                let params = self.parse_param_list()?;
                MemberPattern::Constructor(params)
            }
            _ => {
                let first = self.expect_word()?;
                match self.peek() {
                    Token::LParen => {
                        // `first` was the method name; no return type given
                        // means "any return type".
                        let params = self.parse_param_list()?;
                        MemberPattern::Method {
                            name_pattern: first,
                            param_patterns: params,
                            return_pattern: "*".to_string(),
                        }
                    }
                    _ => {
                        let name = self.expect_word()?;
                        if matches!(self.peek(), Token::LParen) {
                            let params = self.parse_param_list()?;
                            MemberPattern::Method {
                                name_pattern: name,
                                param_patterns: params,
                                return_pattern: first,
                            }
                        } else {
                            MemberPattern::Field { name_pattern: name, type_pattern: first }
                        }
                    }
                }
            }
        };
        let return_interval = self.parse_optional_return_interval()?;
        self.expect_semicolon()?;
        Ok(MemberRule { access, annotation, pattern, return_interval })
    }

    fn parse_param_list(&mut self) -> Result<Vec<String>, ConfigError> {
        match self.bump() {
            Token::LParen => {}
            other => return Err(self.err(format!("expected `(`, found {other:?}"))),
        }
        let mut params = Vec::new();
        loop {
            match self.peek() {
                Token::RParen => {
                    self.bump();
                    break;
                }
                Token::Ellipsis => {
                    self.bump();
                    params.push("...".to_string());
                }
                Token::Word(_) => {
                    params.push(self.expect_word()?);
                }
                Token::Comma => {
                    self.bump();
                }
                other => return Err(self.err(format!("unexpected token in parameter list: {other:?}"))),
            }
        }
        Ok(params)
    }

    fn parse_optional_return_interval(&mut self) -> Result<Option<(i64, i64)>, ConfigError> {
        if let Token::Word(w) = self.peek() {
            if w == "return" {
                self.bump();
                let lo = self.expect_number()?;
                match self.bump() {
                    Token::Ellipsis => {}
                    other => return Err(self.err(format!("expected `..`, found {other:?}"))),
                }
                let hi = self.expect_number()?;
                return Ok(Some((lo, hi)));
            }
        }
        Ok(None)
    }

    fn expect_number(&mut self) -> Result<i64, ConfigError> {
        let w = self.expect_word()?;
        w.parse::<i64>().map_err(|_| self.err(format!("expected a number, found `{w}`")))
    }

    fn expect_semicolon(&mut self) -> Result<(), ConfigError> {
        match self.bump() {
            Token::Semicolon => Ok(()),
            other => Err(self.err(format!("expected `;`, found {other:?}"))),
        }
    }

    fn parse_rule(&mut self, kind: RuleKind) -> Result<(), ConfigError> {
        let annotation = self.parse_annotation();
        let access = self.parse_access_matcher();
        let class_type = self.parse_class_type()?;
        let class_names = self.parse_class_names()?;
        let inheritance = self.parse_inheritance()?;
        let mut members = Vec::new();
        if matches!(self.peek(), Token::LBrace) {
            self.bump();
            while !matches!(self.peek(), Token::RBrace) {
                if matches!(self.peek(), Token::Eof) {
                    return Err(self.err("unterminated member block"));
                }
                members.push(self.parse_member_rule()?);
            }
            self.bump();
        }
        self.config.rules.push(Rule {
            kind,
            annotation,
            class_type,
            access,
            class_names,
            inheritance,
            members,
        });
        Ok(())
    }
}

/// Parse a single configuration buffer. `file` is used only for diagnostics.
pub fn parse_str(file: &str, src: &str) -> Result<Configuration, ConfigError> {
    Parser::new(file, src).parse()
}

/// Parse a configuration file from disk.
pub fn parse_file(path: &std::path::Path) -> Result<Configuration, ConfigError> {
    let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&path.display().to_string(), &src)
}

/// Parse and merge several configuration buffers in order, the way
/// `-pg-conf` accepts a repeatable list of files feeding one configuration.
pub fn parse_merged(files: &[(&str, &str)]) -> Result<Configuration, ConfigError> {
    let mut merged = Configuration::new();
    for (file, src) in files {
        let parsed = parse_str(file, src)?;
        merged.rules.extend(parsed.rules);
        merged.shrink &= parsed.shrink;
        merged.obfuscate &= parsed.obfuscate;
        merged.optimize &= parsed.optimize;
        if parsed.package_obfuscation_mode != PackageObfuscationMode::None {
            merged.package_obfuscation_mode = parsed.package_obfuscation_mode;
        }
        merged.package_prefix = parsed.package_prefix.or(merged.package_prefix);
        merged.attribute_removal_pattern =
            parsed.attribute_removal_pattern.or(merged.attribute_removal_pattern);
        merged.dictionaries.extend(parsed.dictionaries);
        merged.inject_paths.extend(parsed.inject_paths);
        merged.library_paths.extend(parsed.library_paths);
        merged.keep_package_names.extend(parsed.keep_package_names);
        merged.ignore_missing_classes |= parsed.ignore_missing_classes;
        merged.ignore_warnings |= parsed.ignore_warnings;
        merged.dont_warn.extend(parsed.dont_warn);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_keep_rule() {
        let cfg = parse_str("test.pro", "-keep class Bar { *; }").unwrap();
        assert_eq!(cfg.rules.len(), 1);
        assert_eq!(cfg.rules[0].kind, RuleKind::Keep);
        assert_eq!(cfg.rules[0].class_names, vec!["Bar".to_string()]);
        assert_eq!(cfg.rules[0].members.len(), 1);
        assert_eq!(cfg.rules[0].members[0].pattern, MemberPattern::All);
    }

    #[test]
    fn parses_assume_values_return_interval() {
        let cfg = parse_str("test.pro", "-keep class Foo { int value() return 1..5; }").unwrap();
        let member = &cfg.rules[0].members[0];
        assert_eq!(member.return_interval, Some((1, 5)));
        assert!(matches!(&member.pattern, MemberPattern::Method { name_pattern, .. } if name_pattern == "value"));
    }

    #[test]
    fn parses_inheritance_clause() {
        let cfg = parse_str("test.pro", "-keep class * extends android.app.Activity").unwrap();
        let clause = cfg.rules[0].inheritance.as_ref().unwrap();
        assert!(clause.is_extends);
        assert_eq!(clause.name_pattern, "android.app.Activity");
    }

    #[test]
    fn unknown_option_with_no_leading_dash_argument_is_ignored() {
        let cfg = parse_str("test.pro", "-someunknownflag\n-keep class Foo { *; }").unwrap();
        assert_eq!(cfg.rules.len(), 1);
    }

    #[test]
    fn malformed_rule_reports_line_and_column() {
        let err = parse_str("test.pro", "-keep notaclasskeyword Foo").unwrap_err();
        match err {
            ConfigError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }
}
