//! Keep-rule AST: one node type per shape named in the rule grammar.

bitflags::bitflags! {
    /// Access-flag keywords a rule or member-rule can require or forbid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AccessFlags: u16 {
        const PUBLIC    = 0x0001;
        const PRIVATE   = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC    = 0x0008;
        const FINAL     = 0x0010;
        const ABSTRACT  = 0x0020;
        const SYNTHETIC = 0x0040;
        const NATIVE    = 0x0080;
        const VOLATILE  = 0x0100;
        const TRANSIENT = 0x0200;
        const STRICTFP  = 0x0400;
    }
}

/// A required-set / negated-set pair: every flag in `required` must be set,
/// every flag in `negated` must be clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessMatcher {
    pub required: AccessFlags,
    pub negated: AccessFlags,
}

impl AccessMatcher {
    pub fn matches(&self, actual: AccessFlags) -> bool {
        actual.contains(self.required) && (actual & self.negated).is_empty()
    }
}

/// The class-kind a rule's class-specification restricts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassTypeMatcher {
    Class,
    Interface,
    AnnotationType,
    Enum,
    Any,
}

/// A simple annotation-name pattern (`@com.example.Keep`, or `None` meaning
/// "no annotation constraint").
pub type AnnotationMatcher = Option<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceClause {
    /// `true` for `extends`, `false` for `implements`.
    pub is_extends: bool,
    pub annotation: AnnotationMatcher,
    pub name_pattern: String,
}

/// The shape a member rule restricts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberPattern {
    AllMethods,
    AllFields,
    All,
    Init,
    Constructor(Vec<String>),
    Method { name_pattern: String, param_patterns: Vec<String>, return_pattern: String },
    Field { name_pattern: String, type_pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRule {
    pub access: AccessMatcher,
    pub annotation: AnnotationMatcher,
    pub pattern: MemberPattern,
    /// `assume-values` / `assume-no-side-effects` return-value interval,
    /// recorded verbatim; consumption is the optimizer's business.
    pub return_interval: Option<(i64, i64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Keep,
    KeepClassMembers,
    KeepClassesWithMembers,
    WhyAreYouKeeping,
    KeepPackageNames,
    CheckDiscard,
    AssumeNoSideEffects,
    AssumeValues,
    AlwaysInline,
    DontWarn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub kind: RuleKind,
    pub annotation: AnnotationMatcher,
    pub class_type: ClassTypeMatcher,
    pub access: AccessMatcher,
    /// Ordered class-name patterns (`*`/`**`/`?` wildcards, `!` negation).
    pub class_names: Vec<String>,
    pub inheritance: Option<InheritanceClause>,
    pub members: Vec<MemberRule>,
}

impl Rule {
    /// A rule's class-name list is "specific-only" when every pattern is
    /// wildcard-free — the root-set builder can then iterate just those
    /// classes instead of the whole program.
    pub fn is_specific_only(&self) -> bool {
        !self.class_names.is_empty()
            && self
                .class_names
                .iter()
                .all(|p| !p.contains('*') && !p.contains('?'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageObfuscationMode {
    #[default]
    None,
    Repackage,
    Flatten,
}
