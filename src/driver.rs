//! The `Driver`: owns the factory and runs the eight-component pipeline as
//! a sequence of explicit phase calls, each one a barrier — the `shrinker`
//! analogue of the teacher's `Apk::new` "do the stages in order" style
//! (`core/src/apk.rs`'s `Apk::init`).

use ahash::AHashSet;
use log::info;

use shrinker_callgraph::{break_cycles, leaf_layers, CallGraph};
use shrinker_config::Configuration;
use shrinker_dex::{ClassItem, Dex};
use shrinker_distribute::{
    check_min_api, write_program, DexEncoder, Distribution, Distributor, Mode, OutputTarget,
};
use shrinker_enqueue::{AppInfoWithLiveness, Enqueuer, RootSetBuilder};
use shrinker_graph::{
    AccessFlags, Class, ClassId, EncodedField, EncodedMethod, Factory, Lens, Origin, SubtypeIndex,
    TypeId,
};
use shrinker_rename::NameMinifier;

use crate::errors::CompileError;

/// Reads method-body bytecode into the IR the enqueuer's liveness fixpoint
/// walks (`invoke-*`/`iget`/`iput`/`sget`/`sput` edges). *Described
/// interface only* — no Dalvik instruction decoder ships with this crate,
/// the same deliberate scope line that excludes the DEX-writing codec and
/// the optimizer's peephole/regalloc passes. Without a decoder every
/// method is ingested with `code: None`, which is sound (just
/// conservative): it is indistinguishable from an abstract/native method,
/// so the enqueuer treats it as a leaf with no further reachable calls
/// rather than inferring calls that were never decoded.
pub trait CodeDecoder {
    fn decode(&self, dex: &Dex, code_off: u32) -> Option<shrinker_graph::Code>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineOptions {
    pub min_api: u32,
    pub shrink: bool,
    pub obfuscate: bool,
    pub ignore_missing_classes: bool,
}

pub struct Driver {
    factory: Factory,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    pub fn new() -> Self {
        Driver { factory: Factory::new() }
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Ingest every class in a parsed DEX file, interning its types,
    /// protos, and method/field refs through the factory. `origin`
    /// distinguishes program input from `--lib` classpath/library jars —
    /// library classes are opaque roots to the enqueuer (§4.4).
    pub fn ingest_dex(
        &self,
        dex: &Dex,
        origin: Origin,
        decoder: Option<&dyn CodeDecoder>,
    ) -> Result<(), CompileError> {
        for class_item in &dex.class_defs {
            self.ingest_class(dex, class_item, origin, decoder)?;
        }
        Ok(())
    }

    fn ingest_class(
        &self,
        dex: &Dex,
        class_item: &ClassItem,
        origin: Origin,
        decoder: Option<&dyn CodeDecoder>,
    ) -> Result<(), CompileError> {
        let class_type = self.intern_type(dex, class_item.class_idx as usize)?;

        let super_type = if class_item.superclass_idx == shrinker_dex::NO_INDEX {
            None
        } else {
            Some(self.intern_type(dex, class_item.superclass_idx as usize)?)
        };

        let interfaces = dex
            .get_interfaces(class_item)
            .unwrap_or_default()
            .into_iter()
            .map(|idx| self.intern_type(dex, idx as usize))
            .collect::<Result<Vec<_>, _>>()?;

        let source_file = if class_item.source_file_idx == shrinker_dex::NO_INDEX {
            None
        } else {
            dex.get_string(class_item.source_file_idx as usize)
                .map(|s| self.factory.create_string(&s))
        };

        let data = dex.get_class_data(class_item);
        let (static_fields, instance_fields, direct_methods, virtual_methods) = match data {
            Some(data) => (
                data.static_fields
                    .iter()
                    .map(|f| self.intern_field(dex, f))
                    .collect::<Result<Vec<_>, _>>()?,
                data.instance_fields
                    .iter()
                    .map(|f| self.intern_field(dex, f))
                    .collect::<Result<Vec<_>, _>>()?,
                data.direct_methods
                    .iter()
                    .map(|m| self.intern_method(dex, m, decoder))
                    .collect::<Result<Vec<_>, _>>()?,
                data.virtual_methods
                    .iter()
                    .map(|m| self.intern_method(dex, m, decoder))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => (Vec::new(), Vec::new(), Vec::new(), Vec::new()),
        };

        self.factory.define_class(Class {
            class_type,
            origin,
            access_flags: AccessFlags::from_bits_truncate(class_item.access_flags.bits()),
            super_type,
            interfaces,
            source_file,
            annotations: Vec::new(),
            static_fields,
            instance_fields,
            direct_methods,
            virtual_methods,
        })?;

        Ok(())
    }

    fn intern_type(&self, dex: &Dex, type_idx: usize) -> Result<TypeId, CompileError> {
        let descriptor = dex
            .get_type(type_idx)
            .ok_or_else(|| CompileError::InvalidInput(format!("dangling type index {type_idx}")))?;
        Ok(self.factory.create_type(&descriptor)?)
    }

    fn intern_field(
        &self,
        dex: &Dex,
        encoded: &shrinker_dex::EncodedFieldItem,
    ) -> Result<EncodedField, CompileError> {
        let field_item = dex
            .field_ids
            .get(encoded.field_idx as usize)
            .ok_or_else(|| CompileError::InvalidInput(format!("dangling field index {}", encoded.field_idx)))?;
        let holder = self.intern_type(dex, field_item.class_idx as usize)?;
        let field_type = self.intern_type(dex, field_item.type_idx as usize)?;
        let name_str = dex
            .get_string(field_item.name_idx as usize)
            .ok_or_else(|| CompileError::InvalidInput("dangling field name index".to_string()))?;
        let name = self.factory.create_string(&name_str);

        Ok(EncodedField {
            field_ref: self.factory.create_field(holder, name, field_type),
            access_flags: AccessFlags::from_bits_truncate(encoded.access_flags.bits()),
            static_value: None,
            annotations: Vec::new(),
        })
    }

    fn intern_method(
        &self,
        dex: &Dex,
        encoded: &shrinker_dex::EncodedMethodItem,
        decoder: Option<&dyn CodeDecoder>,
    ) -> Result<EncodedMethod, CompileError> {
        let method_item = dex
            .method_ids
            .get(encoded.method_idx as usize)
            .ok_or_else(|| CompileError::InvalidInput(format!("dangling method index {}", encoded.method_idx)))?;
        let holder = self.intern_type(dex, method_item.class_idx as usize)?;
        let name_str = dex
            .get_string(method_item.name_idx as usize)
            .ok_or_else(|| CompileError::InvalidInput("dangling method name index".to_string()))?;
        let name = self.factory.create_string(&name_str);

        let proto_item = dex
            .proto_ids
            .get(method_item.proto_idx as usize)
            .ok_or_else(|| CompileError::InvalidInput("dangling proto index".to_string()))?;
        let return_type = self.intern_type(dex, proto_item.return_type_idx as usize)?;
        let parameters = dex
            .get_proto_parameters(proto_item)
            .unwrap_or_default()
            .into_iter()
            .map(|idx| self.intern_type(dex, idx as usize))
            .collect::<Result<Vec<_>, _>>()?;
        let proto = self.factory.create_proto(return_type, &parameters);

        let code = if encoded.code_off == 0 {
            None
        } else {
            decoder.and_then(|d| d.decode(dex, encoded.code_off))
        };

        Ok(EncodedMethod {
            method_ref: self.factory.create_method(holder, name, proto),
            access_flags: AccessFlags::from_bits_truncate(encoded.access_flags.bits()),
            code,
            debug_info: None,
            annotations: Vec::new(),
        })
    }

    /// §4.3/§4.4: build the root set from the merged Proguard-syntax
    /// configuration, run the liveness-fixpoint enqueuer, and return the
    /// frozen, sorted `AppInfoWithLiveness` plus the `SubtypeIndex` every
    /// later phase needs.
    pub fn analyze(
        &self,
        config: &Configuration,
        opts: &PipelineOptions,
    ) -> Result<(SubtypeIndex, AppInfoWithLiveness), CompileError> {
        let subtypes = SubtypeIndex::build(&self.factory);
        let root_set = RootSetBuilder::new(&self.factory, config).build();
        info!("root set built: {} items reserved from obfuscation", root_set.no_obfuscation.len());

        let info = Enqueuer::new(&self.factory, &subtypes, opts.ignore_missing_classes).run(&root_set)?;
        info!(
            "enqueuer fixpoint converged: {} live types, {} live methods, {} live fields",
            info.live_types.len(),
            info.live_methods.len(),
            info.live_fields.len()
        );

        Ok((subtypes, info))
    }

    /// §4.5/§4.6: build the call graph over live methods, break cycles,
    /// and compute leaf-ordered scheduling layers. The layers themselves
    /// are the seam optimizer passes would walk; no peephole/regalloc body
    /// runs here, per scope.
    pub fn schedule_optimizer_layers(&self, info: &AppInfoWithLiveness) -> Vec<Vec<shrinker_graph::MethodId>> {
        let mut graph = CallGraph::build(info);
        let breakers = break_cycles(&self.factory, &mut graph);
        let broken_edges: usize = breakers.values().map(|callees| callees.len()).sum();
        info!("call graph: {broken_edges} edges broken to eliminate cycles");
        let layers = leaf_layers(&self.factory, graph, |_| {});
        info!("optimizer scheduling: {} leaf layers", layers.len());
        layers
    }

    /// §4.7: run both name minifiers and merge their output into one
    /// `Lens`, only if `opts.obfuscate`; otherwise an empty, no-op lens.
    pub fn minify(
        &self,
        subtypes: &SubtypeIndex,
        config: &Configuration,
        root_set: &shrinker_enqueue::RootSet,
        opts: &PipelineOptions,
    ) -> Lens {
        if !opts.obfuscate {
            return Lens::new();
        }
        NameMinifier::new(&self.factory, subtypes, config).run(root_set).lens
    }

    /// §4.8/§4.9: partition surviving classes, encode and write every
    /// non-empty DEX, and emit the rename map and main-dex list.
    #[allow(clippy::too_many_arguments)]
    pub fn distribute_and_write(
        &self,
        surviving: &[ClassId],
        mode: &Mode,
        main_dex_roots: &AHashSet<TypeId>,
        opts: &PipelineOptions,
        lens: &Lens,
        encoder: &(dyn DexEncoder + Sync),
        output: &OutputTarget,
    ) -> Result<Distribution, CompileError> {
        let version = shrinker_distribute::select_dex_version(opts.min_api);
        check_min_api(opts.min_api, version.clone())?;

        let distribution = Distributor::new(&self.factory).run(surviving, mode, main_dex_roots)?;
        info!("distributor emitted {} dex files", distribution.dexes.iter().filter(|d| !d.classes.is_empty()).count());

        write_program(&self.factory, lens, &distribution, version, encoder, output)?;
        Ok(distribution)
    }

    /// Classes that survived the enqueuer: every `Origin::Program` class
    /// whose type is in `info.live_types`.
    pub fn surviving_program_classes(&self, info: &AppInfoWithLiveness) -> Vec<ClassId> {
        let live: AHashSet<TypeId> = info.live_types.iter().copied().collect();
        self.factory
            .class_ids()
            .into_iter()
            .filter(|&id| {
                self.factory.with_class(id, |c| c.origin == Origin::Program && live.contains(&c.class_type))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_config::parse_str;

    fn program_class(factory: &Factory, descriptor: &str) -> ClassId {
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
    fn analyze_then_distribute_keeps_kept_class() {
        let driver = Driver::new();
        program_class(driver.factory(), "Lcom/example/Foo;");
        program_class(driver.factory(), "Lcom/example/Bar;");

        let config = parse_str("t.pro", "-keep class com.example.Foo").unwrap();
        let root_set = RootSetBuilder::new(driver.factory(), &config).build();
        let opts = PipelineOptions { min_api: 21, shrink: true, obfuscate: false, ignore_missing_classes: false };
        let (_subtypes, info) = driver.analyze(&config, &opts).unwrap();

        let surviving = driver.surviving_program_classes(&info);
        assert_eq!(surviving.len(), 1);
        let kept_ty = driver.factory().with_class(surviving[0], |c| c.class_type);
        assert_eq!(driver.factory().type_descriptor(kept_ty).as_ref(), "Lcom/example/Foo;");
        let _ = root_set;
    }
}
