//! The root-set builder (§4.3): classifies every program item against the
//! parsed configuration's rule list.

use ahash::{AHashMap, AHashSet};
use shrinker_config::{
    AccessMatcher as ConfigAccessMatcher, ClassTypeMatcher, Configuration, MemberPattern, Rule,
    RuleKind,
};
use shrinker_graph::{AccessFlags, ClassId, Factory, FieldId, MethodId, TypeId};

use crate::item::{Item, KeepReason};
use crate::pattern::{glob_match, matches_with_negation};

#[derive(Debug, Default)]
pub struct RootSet {
    pub no_shrinking: AHashSet<Item>,
    pub no_optimization: AHashSet<Item>,
    pub no_obfuscation: AHashSet<Item>,
    pub reason_asked: AHashSet<Item>,
    pub keep_package_name: AHashSet<Item>,
    pub check_discarded: AHashSet<Item>,
    pub always_inline: AHashSet<MethodId>,
    pub no_side_effects: AHashSet<MethodId>,
    pub assumed_values: AHashMap<MethodId, (i64, i64)>,
    /// `item -> (dependency -> rule index)`: `item` survives if `dependency`
    /// does, attributed to the rule that produced the relationship.
    pub dependent_no_shrinking: AHashMap<Item, AHashMap<Item, usize>>,
    pub reasons: AHashMap<Item, Vec<KeepReason>>,
}

impl RootSet {
    fn add_reason(&mut self, item: Item, reason: KeepReason) {
        self.reasons.entry(item).or_default().push(reason);
    }
}

pub struct RootSetBuilder<'a> {
    factory: &'a Factory,
    config: &'a Configuration,
}

fn access_matches(matcher: &ConfigAccessMatcher, actual: AccessFlags) -> bool {
    use shrinker_config::AccessFlags as C;
    let pairs: &[(C, AccessFlags)] = &[
        (C::PUBLIC, AccessFlags::PUBLIC),
        (C::PRIVATE, AccessFlags::PRIVATE),
        (C::PROTECTED, AccessFlags::PROTECTED),
        (C::STATIC, AccessFlags::STATIC),
        (C::FINAL, AccessFlags::FINAL),
        (C::ABSTRACT, AccessFlags::ABSTRACT),
        (C::SYNTHETIC, AccessFlags::SYNTHETIC),
        (C::NATIVE, AccessFlags::NATIVE),
        (C::VOLATILE, AccessFlags::VOLATILE),
        (C::TRANSIENT, AccessFlags::TRANSIENT),
        (C::STRICTFP, AccessFlags::STRICT),
    ];
    for &(cflag, gflag) in pairs {
        if matcher.required.contains(cflag) && !actual.contains(gflag) {
            return false;
        }
        if matcher.negated.contains(cflag) && actual.contains(gflag) {
            return false;
        }
    }
    true
}

impl<'a> RootSetBuilder<'a> {
    pub fn new(factory: &'a Factory, config: &'a Configuration) -> Self {
        RootSetBuilder { factory, config }
    }

    pub fn build(&self) -> RootSet {
        let mut set = RootSet::default();
        for (index, rule) in self.config.rules.iter().enumerate() {
            self.apply_rule(index, rule, &mut set);
        }
        set
    }

    fn candidate_classes(&self, rule: &Rule) -> Vec<ClassId> {
        if rule.is_specific_only() {
            rule.class_names
                .iter()
                .filter_map(|name| {
                    let descriptor = format!("L{};", name.replace('.', "/"));
                    self.factory.create_type(&descriptor).ok()
                })
                .filter_map(|ty| self.factory.definition_for(ty))
                .collect()
        } else {
            self.factory.class_ids()
        }
    }

    fn class_type_matches(&self, matcher: ClassTypeMatcher, flags: AccessFlags) -> bool {
        match matcher {
            ClassTypeMatcher::Any => true,
            ClassTypeMatcher::Interface => flags.is_interface() && !flags.is_annotation(),
            ClassTypeMatcher::AnnotationType => flags.is_annotation(),
            ClassTypeMatcher::Enum => flags.is_enum(),
            ClassTypeMatcher::Class => !flags.is_interface() && !flags.is_annotation(),
        }
    }

    fn class_name_matches(&self, rule: &Rule, class_id: ClassId) -> bool {
        if rule.class_names.is_empty() {
            return true;
        }
        let ty = self.factory.with_class(class_id, |c| c.class_type);
        let descriptor = self.factory.type_descriptor(ty);
        rule.class_names.iter().any(|p| matches_with_negation(p, &descriptor))
    }

    /// Walk the super-chain and interface set of `class_id` looking for a
    /// type whose descriptor matches `name_pattern`. Returns
    /// `(extends_matched, implements_matched)`.
    fn inheritance_matches(&self, class_id: ClassId, name_pattern: &str) -> (bool, bool) {
        let mut extends_matched = false;
        let mut implements_matched = false;
        let mut current = Some(class_id);
        let mut guard = 0;
        while let Some(id) = current {
            guard += 1;
            if guard > 10_000 {
                break; // defend against a cyclic super chain slipping past validation
            }
            let (super_type, interfaces) =
                self.factory.with_class(id, |c| (c.super_type, c.interfaces.clone()));
            for iface in &interfaces {
                let descriptor = self.factory.type_descriptor(*iface);
                if matches_with_negation(name_pattern, &descriptor) {
                    implements_matched = true;
                }
            }
            current = super_type.and_then(|t| {
                let descriptor = self.factory.type_descriptor(t);
                if matches_with_negation(name_pattern, &descriptor) {
                    extends_matched = true;
                }
                self.factory.definition_for(t)
            });
        }
        (extends_matched, implements_matched)
    }

    fn apply_rule(&self, index: usize, rule: &Rule, set: &mut RootSet) {
        for class_id in self.candidate_classes(rule) {
            let (class_type, access_flags, annotations) = self.factory.with_class(class_id, |c| {
                (c.class_type, c.access_flags, c.annotations.clone())
            });

            if !access_matches(&rule.access, access_flags) {
                continue;
            }
            if !self.class_type_matches(rule.class_type, access_flags) {
                continue;
            }
            if let Some(pattern) = &rule.annotation {
                let has_match = annotations.iter().any(|a| {
                    let d = self.factory.type_descriptor(a.annotation_type);
                    matches_with_negation(pattern, &d)
                });
                if !has_match {
                    continue;
                }
            }
            if !self.class_name_matches(rule, class_id) {
                continue;
            }
            if let Some(clause) = &rule.inheritance {
                let (extends_matched, implements_matched) =
                    self.inheritance_matches(class_id, &clause.name_pattern);
                let matched = if clause.is_extends {
                    extends_matched || implements_matched
                } else {
                    implements_matched || extends_matched
                };
                if !matched {
                    continue;
                }
                if clause.is_extends && !extends_matched && implements_matched {
                    log::warn!(
                        "rule #{index} asked for `extends {}` but only `implements` matched",
                        clause.name_pattern
                    );
                } else if !clause.is_extends && !implements_matched && extends_matched {
                    log::warn!(
                        "rule #{index} asked for `implements {}` but only `extends` matched",
                        clause.name_pattern
                    );
                }
            }

            self.apply_matched_class(index, rule, class_id, class_type, set);
        }
    }

    fn apply_matched_class(
        &self,
        index: usize,
        rule: &Rule,
        class_id: ClassId,
        class_type: TypeId,
        set: &mut RootSet,
    ) {
        let class_item = Item::Class(class_id);
        match rule.kind {
            RuleKind::WhyAreYouKeeping => {
                set.reason_asked.insert(class_item);
                return;
            }
            RuleKind::CheckDiscard => {
                set.check_discarded.insert(class_item);
                return;
            }
            RuleKind::KeepPackageNames => {
                set.keep_package_name.insert(class_item);
                return;
            }
            RuleKind::DontWarn => return,
            _ => {}
        }

        let member_decisions = self.collect_member_matches(class_id, rule);

        match rule.kind {
            RuleKind::Keep => {
                set.no_shrinking.insert(class_item);
                set.no_obfuscation.insert(class_item);
                set.add_reason(class_item, KeepReason::Rule(index));
                for &(member, _) in &member_decisions {
                    set.no_shrinking.insert(member);
                    set.no_obfuscation.insert(member);
                    set.add_reason(member, KeepReason::Rule(index));
                }
            }
            RuleKind::KeepClassMembers => {
                for &(member, _) in &member_decisions {
                    set.no_shrinking.insert(member);
                    set.no_obfuscation.insert(member);
                    set.add_reason(member, KeepReason::Rule(index));
                }
            }
            RuleKind::KeepClassesWithMembers => {
                let all_members_satisfied =
                    !rule.members.is_empty() && member_decisions.len() >= rule.members.len();
                if all_members_satisfied {
                    set.no_shrinking.insert(class_item);
                    set.no_obfuscation.insert(class_item);
                    set.add_reason(class_item, KeepReason::Rule(index));
                    for &(member, _) in &member_decisions {
                        set.no_shrinking.insert(member);
                        set.no_obfuscation.insert(member);
                    }
                }
            }
            RuleKind::AlwaysInline => {
                for &(member, _) in &member_decisions {
                    if let Item::Method(m) = member {
                        set.always_inline.insert(m);
                    }
                }
            }
            RuleKind::AssumeNoSideEffects => {
                for &(member, _) in &member_decisions {
                    if let Item::Method(m) = member {
                        set.no_side_effects.insert(m);
                    }
                }
            }
            RuleKind::AssumeValues => {
                for &(member, member_rule) in &member_decisions {
                    if let (Item::Method(m), Some(interval)) = (member, member_rule.return_interval) {
                        set.assumed_values.insert(m, interval);
                    }
                }
            }
            _ => {}
        }

        // `includeDescriptorClasses`-equivalent: every matched member's
        // parameter/return/field types survive iff the member does.
        for &(member, _) in &member_decisions {
            if let Item::Method(method_id) = member {
                let method_ref = self.factory.get_method(method_id);
                let proto = self.factory.get_proto(method_ref.proto);
                for &param in proto.parameters.iter().chain(std::iter::once(&proto.return_type)) {
                    if let Some(dep_class) = self.factory.definition_for(param) {
                        set.dependent_no_shrinking
                            .entry(member)
                            .or_default()
                            .insert(Item::Class(dep_class), index);
                    }
                }
            } else if let Item::Field(field_id) = member {
                let field_ref = self.factory.get_field(field_id);
                if let Some(dep_class) = self.factory.definition_for(field_ref.field_type) {
                    set.dependent_no_shrinking
                        .entry(member)
                        .or_default()
                        .insert(Item::Class(dep_class), index);
                }
            }
        }

        let _ = class_type;
    }

    fn collect_member_matches<'r>(
        &self,
        class_id: ClassId,
        rule: &'r Rule,
    ) -> Vec<(Item, &'r shrinker_config::MemberRule)> {
        if rule.members.is_empty() {
            return Vec::new();
        }
        let (methods, fields) = self.factory.with_class(class_id, |c| {
            let methods: Vec<(MethodId, AccessFlags)> =
                c.all_methods().map(|m| (m.method_ref, m.access_flags)).collect();
            let fields: Vec<(FieldId, AccessFlags)> =
                c.all_fields().map(|f| (f.field_ref, f.access_flags)).collect();
            (methods, fields)
        });

        let mut out = Vec::new();
        for member_rule in &rule.members {
            for &(method_id, flags) in &methods {
                if !access_matches(&member_rule.access, flags) {
                    continue;
                }
                let method_ref = self.factory.get_method(method_id);
                let name = self.factory.get_string(method_ref.name);
                let matched = match &member_rule.pattern {
                    MemberPattern::All | MemberPattern::AllMethods => true,
                    MemberPattern::Init | MemberPattern::Constructor(_) => name.as_ref() == "<init>",
                    MemberPattern::Method { name_pattern, .. } => glob_match(name_pattern, &name),
                    MemberPattern::AllFields | MemberPattern::Field { .. } => false,
                };
                if matched {
                    out.push((Item::Method(method_id), member_rule));
                }
            }
            for &(field_id, flags) in &fields {
                if !access_matches(&member_rule.access, flags) {
                    continue;
                }
                let field_ref = self.factory.get_field(field_id);
                let name = self.factory.get_string(field_ref.name);
                let matched = match &member_rule.pattern {
                    MemberPattern::All | MemberPattern::AllFields => true,
                    MemberPattern::Field { name_pattern, .. } => glob_match(name_pattern, &name),
                    _ => false,
                };
                if matched {
                    out.push((Item::Field(field_id), member_rule));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_config::parse_str;
    use shrinker_graph::{Class, Origin};

    fn empty_class(factory: &Factory, descriptor: &str) -> ClassId {
        let class_type = factory.create_type(descriptor).unwrap();
        factory
            .define_class(Class {
                class_type,
                origin: Origin::Program,
                access_flags: AccessFlags::PUBLIC,
                super_type: None,
                interfaces: vec![],
                source_file: None,
                annotations: vec![],
                static_fields: vec![],
                instance_fields: vec![],
                direct_methods: vec![],
                virtual_methods: vec![],
            })
            .unwrap()
    }

    #[test]
    fn keep_rule_marks_class_no_shrinking() {
        let factory = Factory::new();
        let bar = empty_class(&factory, "Lcom/example/Bar;");
        let config = parse_str("test.pro", "-keep class com.example.Bar").unwrap();
        let set = RootSetBuilder::new(&factory, &config).build();
        assert!(set.no_shrinking.contains(&Item::Class(bar)));
    }

    #[test]
    fn non_matching_class_is_not_kept() {
        let factory = Factory::new();
        empty_class(&factory, "Lcom/example/Bar;");
        let foo = empty_class(&factory, "Lcom/example/Foo;");
        let config = parse_str("test.pro", "-keep class com.example.Bar").unwrap();
        let set = RootSetBuilder::new(&factory, &config).build();
        assert!(!set.no_shrinking.contains(&Item::Class(foo)));
    }
}
