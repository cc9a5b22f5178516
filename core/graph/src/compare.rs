//! A total, deterministic ordering over program items ("slow-compare" in
//! the spec): every set the enqueuer and call-graph sort before handing to
//! a downstream phase uses this, so that two runs over identical input
//! produce bit-identical output regardless of hash-map iteration order.

use std::cmp::Ordering;

use crate::factory::Factory;
use crate::items::{FieldId, MethodId, TypeId};

/// Order two types by their descriptor bytes.
pub fn compare_types(factory: &Factory, a: TypeId, b: TypeId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    factory.type_descriptor(a).cmp(&factory.type_descriptor(b))
}

/// Order two methods by `(holder descriptor, name, proto shorty)`.
pub fn compare_methods(factory: &Factory, a: MethodId, b: MethodId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let ra = factory.get_method(a);
    let rb = factory.get_method(b);
    compare_types(factory, ra.holder, rb.holder)
        .then_with(|| factory.get_string(ra.name).cmp(&factory.get_string(rb.name)))
        .then_with(|| {
            let pa = factory.get_proto(ra.proto);
            let pb = factory.get_proto(rb.proto);
            compare_types(factory, pa.return_type, pb.return_type).then_with(|| {
                pa.parameters
                    .iter()
                    .zip(pb.parameters.iter())
                    .map(|(&x, &y)| compare_types(factory, x, y))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or_else(|| pa.parameters.len().cmp(&pb.parameters.len()))
            })
        })
}

/// Order two fields by `(holder descriptor, name, field-type descriptor)`.
pub fn compare_fields(factory: &Factory, a: FieldId, b: FieldId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let ra = factory.get_field(a);
    let rb = factory.get_field(b);
    compare_types(factory, ra.holder, rb.holder)
        .then_with(|| factory.get_string(ra.name).cmp(&factory.get_string(rb.name)))
        .then_with(|| compare_types(factory, ra.field_type, rb.field_type))
}

/// Sort a slice of items using one of the `compare_*` functions above —
/// thin wrapper so call sites read as `slow_sort(&factory, &mut v,
/// compare_methods)`.
pub fn slow_sort<T: Copy>(factory: &Factory, items: &mut [T], cmp: impl Fn(&Factory, T, T) -> Ordering) {
    items.sort_by(|&a, &b| cmp(factory, a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_order_is_lexicographic_and_deterministic() {
        let factory = Factory::new();
        let a = factory.create_type("La/A;").unwrap();
        let b = factory.create_type("Lb/B;").unwrap();
        assert_eq!(compare_types(&factory, a, b), Ordering::Less);
        assert_eq!(compare_types(&factory, b, a), Ordering::Greater);
        assert_eq!(compare_types(&factory, a, a), Ordering::Equal);
    }
}
