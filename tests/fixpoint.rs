//! Fixpoint discipline: combining is idempotent and every rewrite keeps the
//! use-lists and SSA structure intact.

use opal::ir::function::Param;
use opal::ir::instr::{Instr, Opcode};
use opal::ir::module::{FunctionBuilder, Module};
use opal::ir::types::Type;
use opal::pass::{Pass, PassManager};
use opal::{run_combine, CombineOptions, CombinePass, InlinePass, ValidatePass};

fn i64t() -> Type {
    Type::Int { bits: 64 }
}

/// A function mixing several rewrite families: a cast chain, counting of a
/// trivial value, and an aggregate load with projection users.
fn build_mixed(module: &mut Module) -> opal::ir::function::FunctionId {
    module.types.add_class("Base", None).unwrap();
    module.types.add_class("Mid", Some("Base".into())).unwrap();
    module.types.add_class("Leaf", Some("Mid".into())).unwrap();
    module
        .types
        .add_struct("Pair", vec![("a".into(), i64t()), ("b".into(), i64t())])
        .unwrap();
    let pair = Type::Struct("Pair".into());
    let pair_addr = Type::address_of(pair.clone());
    let leaf = Type::Class("Leaf".into());

    let mut fb = FunctionBuilder::new(
        module,
        "mixed",
        vec![Param::new("p", pair_addr.clone()), Param::new("x", leaf.clone())],
        i64t(),
    );
    let entry = fb.create_block(Some("entry"));
    let p = fb.add_block_param(entry, Some("p"), pair_addr);
    let x = fb.add_block_param(entry, Some("x"), leaf);
    fb.set_current_block(entry);

    let (_, mid) = fb.push(Instr::Upcast { operand: x }, Some(Type::Class("Mid".into())));
    let (_, base) = fb.push(
        Instr::Upcast { operand: mid.unwrap() },
        Some(Type::Class("Base".into())),
    );
    fb.push(Instr::StrongRetain { operand: base.unwrap() }, None);

    let (_, v) = fb.push(Instr::Load { operand: p }, Some(pair));
    let (_, a) = fb.push(
        Instr::StructExtract { operand: v.unwrap(), field: 0 },
        Some(i64t()),
    );
    let (_, b) = fb.push(
        Instr::StructExtract { operand: v.unwrap(), field: 1 },
        Some(i64t()),
    );
    fb.push(Instr::RetainValue { operand: a.unwrap() }, None);
    fb.push(Instr::Return { operand: b.unwrap() }, None);
    fb.finish().unwrap()
}

#[test]
fn combining_twice_reaches_the_same_fixpoint() {
    let mut module = Module::new("fixpoint");
    let fid = build_mixed(&mut module);

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    let rewrites_after_first = module.stats.rewrites;
    assert!(rewrites_after_first > 0);
    ValidatePass.run(&mut module).unwrap();

    // The second run finds nothing to do and counts no rewrites.
    assert!(!run_combine(&mut module, fid, &CombineOptions::default()));
    assert_eq!(module.stats.rewrites, rewrites_after_first);
}

#[test]
fn fixpoint_has_no_residual_redexes() {
    let mut module = Module::new("fixpoint");
    let fid = build_mixed(&mut module);
    run_combine(&mut module, fid, &CombineOptions::default());

    let f = module.function(fid);
    for &i in f.blocks().iter().flat_map(|bl| bl.insts.iter()) {
        let instr = &f.inst(i).instr;
        // No upcast-of-upcast chains survive.
        if let Instr::Upcast { operand } = instr {
            assert!(!matches!(
                opal::pattern::inst_def(f, *operand),
                Some((_, Instr::Upcast { .. }))
            ));
        }
        // No counting of trivial values survives.
        if let Instr::RetainValue { operand } | Instr::ReleaseValue { operand } = instr {
            assert!(!f
                .value_type(*operand)
                .expect("operand must stay typed")
                .is_trivial(&module.types));
        }
        // No aggregate load with only projection users survives.
        assert_ne!(instr.opcode(), Opcode::StructExtract);
    }
}

#[test]
fn combine_pass_runs_over_every_function() {
    let mut module = Module::new("fixpoint");
    build_mixed(&mut module);

    // A second, already-canonical function.
    let mut fb = FunctionBuilder::new(
        &mut module,
        "clean",
        vec![Param::new("x", i64t())],
        i64t(),
    );
    let entry = fb.create_block(Some("entry"));
    let x = fb.add_block_param(entry, Some("x"), i64t());
    fb.set_current_block(entry);
    fb.push(Instr::Return { operand: x }, None);
    fb.finish().unwrap();

    CombinePass::new().run(&mut module).unwrap();
    ValidatePass.run(&mut module).unwrap();
    assert!(module.stats.rewrites > 0);
}

#[test]
fn standard_pipeline_runs_clean() {
    let mut module = Module::new("fixpoint");
    build_mixed(&mut module);

    let mut pm = PassManager::new();
    pm.add_pass(ValidatePass);
    pm.add_pass(CombinePass::new());
    pm.add_pass(InlinePass::default());
    pm.add_pass(ValidatePass);
    assert_eq!(pm.pass_names(), ["validate", "combine", "inline", "validate"]);
    pm.run(&mut module).expect("pipeline should succeed");
}
