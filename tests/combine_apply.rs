//! Apply rewrites and builtin folding.

use opal::ir::function::{FunctionId, Param};
use opal::ir::instr::{BuiltinKind, Instr, Opcode, OperandList};
use opal::ir::module::{FunctionBuilder, Module};
use opal::ir::types::{EffectsKind, FnSig, MetatypeRepr, ParamInfo, Type};
use opal::ir::value::ValueId;
use opal::pass::Pass;
use opal::{run_combine, CombineOptions, ValidatePass};

fn i64t() -> Type {
    Type::Int { bits: 64 }
}

fn count_opcode(module: &Module, func: FunctionId, opcode: Opcode) -> usize {
    let f = module.function(func);
    f.blocks()
        .iter()
        .flat_map(|b| b.insts.iter())
        .filter(|&&i| f.inst(i).instr.opcode() == opcode)
        .count()
}

fn validate(module: &mut Module) {
    ValidatePass.run(module).expect("IR should stay valid after combining");
}

fn args(values: &[ValueId]) -> OperandList {
    values.iter().copied().collect()
}

fn return_literal(module: &Module, func: FunctionId) -> i128 {
    let f = module.function(func);
    let ret = f.terminator(f.entry_block().id).unwrap();
    let Instr::Return { operand } = f.inst(ret).instr else { unreachable!() };
    let def = match f.value_def(operand) {
        Some(opal::ir::value::ValueDef::InstResult { inst }) => *inst,
        _ => panic!("return should read an instruction result"),
    };
    match f.inst(def).instr {
        Instr::IntegerLiteral { value } => value,
        _ => panic!("return should read an integer literal"),
    }
}

#[test]
fn sub_of_identical_operands_folds_to_zero() {
    let mut module = Module::new("apply");
    let mut fb =
        FunctionBuilder::new(&mut module, "f", vec![Param::new("x", i64t())], i64t());
    let entry = fb.create_block(Some("entry"));
    let x = fb.add_block_param(entry, Some("x"), i64t());
    fb.set_current_block(entry);
    let (_, sub) = fb.push(
        Instr::BuiltinRef { kind: BuiltinKind::Sub },
        Some(Type::RawPointer),
    );
    let (_, r) = fb.push(
        Instr::Apply {
            callee: sub.unwrap(),
            args: args(&[x, x]),
            substitutions: vec![],
            transparent: false,
        },
        Some(i64t()),
    );
    fb.push(Instr::Return { operand: r.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::Apply), 0);
    assert_eq!(return_literal(&module, fid), 0);
}

#[test]
fn can_be_class_folds_by_type_trait() {
    for (queried, expected) in [
        (Type::Class("Obj".into()), Some(1)),
        (i64t(), Some(0)),
        (Type::Archetype("T".into()), None),
    ] {
        let mut module = Module::new("apply");
        module.types.add_class("Obj", None).unwrap();
        let mut fb = FunctionBuilder::new(&mut module, "f", vec![], Type::BOOL);
        let entry = fb.create_block(Some("entry"));
        fb.set_current_block(entry);
        let (_, cbc) = fb.push(
            Instr::BuiltinRef { kind: BuiltinKind::CanBeClass },
            Some(Type::RawPointer),
        );
        let (_, r) = fb.push(
            Instr::Apply {
                callee: cbc.unwrap(),
                args: OperandList::new(),
                substitutions: vec![queried],
                transparent: false,
            },
            Some(Type::BOOL),
        );
        fb.push(Instr::Return { operand: r.unwrap() }, None);
        let fid = fb.finish().unwrap();

        let changed = run_combine(&mut module, fid, &CombineOptions::default());
        validate(&mut module);
        match expected {
            Some(v) => {
                assert!(changed);
                assert_eq!(return_literal(&module, fid), v);
            }
            // An archetype can still be a class at runtime; no folding.
            None => assert!(!changed),
        }
    }
}

#[test]
fn pointer_equality_folds_when_zeroness_is_known() {
    let mut module = Module::new("apply");
    let mut fb = FunctionBuilder::new(&mut module, "f", vec![], Type::BOOL);
    let entry = fb.create_block(Some("entry"));
    fb.set_current_block(entry);
    let (_, zero_a) = fb.push(Instr::IntegerLiteral { value: 0 }, Some(i64t()));
    let (_, zero_b) = fb.push(Instr::IntegerLiteral { value: 0 }, Some(i64t()));
    let (_, eq) = fb.push(
        Instr::BuiltinRef { kind: BuiltinKind::ICmpEq },
        Some(Type::RawPointer),
    );
    let (_, r) = fb.push(
        Instr::Apply {
            callee: eq.unwrap(),
            args: args(&[zero_a.unwrap(), zero_b.unwrap()]),
            substitutions: vec![],
            transparent: false,
        },
        Some(Type::BOOL),
    );
    fb.push(Instr::Return { operand: r.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(return_literal(&module, fid), 1);
}

#[test]
fn overflow_bit_of_literal_arithmetic_folds_to_zero() {
    let mut module = Module::new("apply");
    let tuple_ty = Type::Tuple(vec![i64t(), Type::BOOL]);
    let mut fb = FunctionBuilder::new(&mut module, "f", vec![], Type::BOOL);
    let entry = fb.create_block(Some("entry"));
    fb.set_current_block(entry);
    let (_, three) = fb.push(Instr::IntegerLiteral { value: 3 }, Some(i64t()));
    let (_, four) = fb.push(Instr::IntegerLiteral { value: 4 }, Some(i64t()));
    let (_, flag) = fb.push(Instr::IntegerLiteral { value: 0 }, Some(Type::BOOL));
    let (_, add) = fb.push(
        Instr::BuiltinRef { kind: BuiltinKind::SAddOver },
        Some(Type::RawPointer),
    );
    let (_, r) = fb.push(
        Instr::Apply {
            callee: add.unwrap(),
            args: args(&[three.unwrap(), four.unwrap(), flag.unwrap()]),
            substitutions: vec![],
            transparent: false,
        },
        Some(tuple_ty),
    );
    let (_, bit) = fb.push(
        Instr::TupleExtract { operand: r.unwrap(), index: 1 },
        Some(Type::BOOL),
    );
    fb.push(Instr::Return { operand: bit.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(return_literal(&module, fid), 0);
}

#[test]
fn stride_multiply_normalizes_stride_to_the_right() {
    let mut module = Module::new("apply");
    let tuple_ty = Type::Tuple(vec![i64t(), Type::BOOL]);
    let mut fb =
        FunctionBuilder::new(&mut module, "f", vec![Param::new("d", i64t())], i64t());
    let entry = fb.create_block(Some("entry"));
    let d = fb.add_block_param(entry, Some("d"), i64t());
    fb.set_current_block(entry);
    let (_, mt) = fb.push(
        Instr::Metatype,
        Some(Type::metatype(i64t(), MetatypeRepr::Thin)),
    );
    let (_, strideof) = fb.push(
        Instr::BuiltinRef { kind: BuiltinKind::Strideof },
        Some(Type::RawPointer),
    );
    let (_, stride) = fb.push(
        Instr::Apply {
            callee: strideof.unwrap(),
            args: args(&[mt.unwrap()]),
            substitutions: vec![],
            transparent: false,
        },
        Some(i64t()),
    );
    let (_, flag) = fb.push(Instr::IntegerLiteral { value: 0 }, Some(Type::BOOL));
    let (_, smul) = fb.push(
        Instr::BuiltinRef { kind: BuiltinKind::SMulOver },
        Some(Type::RawPointer),
    );
    let (_, mul) = fb.push(
        Instr::Apply {
            callee: smul.unwrap(),
            args: args(&[stride.unwrap(), d, flag.unwrap()]),
            substitutions: vec![],
            transparent: false,
        },
        Some(tuple_ty),
    );
    let (_, v) = fb.push(
        Instr::TupleExtract { operand: mul.unwrap(), index: 0 },
        Some(i64t()),
    );
    fb.push(Instr::Return { operand: v.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);

    let f = module.function(fid);
    let mul_inst = f
        .blocks()
        .iter()
        .flat_map(|b| b.insts.iter())
        .find(|&&i| match &f.inst(i).instr {
            Instr::Apply { callee, .. } => {
                matches!(
                    opal::pattern::inst_def(f, *callee),
                    Some((_, Instr::BuiltinRef { kind: BuiltinKind::SMulOver }))
                )
            }
            _ => false,
        })
        .copied()
        .unwrap();
    let Instr::Apply { args: mul_args, .. } = &f.inst(mul_inst).instr else { unreachable!() };
    assert_eq!(mul_args[0], d);
    assert_eq!(mul_args[1], stride.unwrap());
}

#[test]
fn apply_of_partial_apply_flattens() {
    let mut module = Module::new("apply");
    module.types.add_class("Ctx", None).unwrap();
    let ctx = Type::Class("Ctx".into());
    let thin = Type::function(FnSig::thin(
        vec![ParamInfo::guaranteed(i64t()), ParamInfo::owned(ctx.clone())],
        i64t(),
    ));
    let thick = Type::function(FnSig::thick(vec![ParamInfo::guaranteed(i64t())], i64t()));

    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("a", i64t()), Param::new("c", ctx.clone())],
        i64t(),
    );
    let entry = fb.create_block(Some("entry"));
    let a = fb.add_block_param(entry, Some("a"), i64t());
    let c = fb.add_block_param(entry, Some("c"), ctx.clone());
    fb.set_current_block(entry);
    let (_, g) = fb.push(Instr::FunctionRef { name: "g".into() }, Some(thin));
    let (_, pa) = fb.push(
        Instr::PartialApply {
            callee: g.unwrap(),
            args: args(&[c]),
            substitutions: vec![],
        },
        Some(thick),
    );
    let (_, r) = fb.push(
        Instr::Apply {
            callee: pa.unwrap(),
            args: args(&[a]),
            substitutions: vec![],
            transparent: false,
        },
        Some(i64t()),
    );
    fb.push(Instr::Return { operand: r.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);

    // The closure is gone; the call goes straight to g with the capture
    // appended, and the capture's ownership transfer is balanced by a
    // retain (for the call) and a release (for the closure's death).
    assert_eq!(count_opcode(&module, fid, Opcode::PartialApply), 0);
    let f = module.function(fid);
    let call = f
        .blocks()
        .iter()
        .flat_map(|b| b.insts.iter())
        .find(|&&i| f.inst(i).instr.opcode() == Opcode::Apply)
        .copied()
        .unwrap();
    let Instr::Apply { callee, args: call_args, .. } = &f.inst(call).instr else {
        unreachable!()
    };
    assert_eq!(*callee, g.unwrap());
    assert_eq!(call_args.as_slice(), &[a, c]);
    assert!(count_opcode(&module, fid, Opcode::StrongRetain) >= 1);
    assert!(count_opcode(&module, fid, Opcode::StrongRelease) >= 1);
}

#[test]
fn captureless_partial_apply_is_a_representation_change() {
    let mut module = Module::new("apply");
    let thin = Type::function(FnSig::thin(vec![], i64t()));
    let thick = Type::function(FnSig::thick(vec![], i64t()));

    let mut fb = FunctionBuilder::new(&mut module, "f", vec![], thick.clone());
    let entry = fb.create_block(Some("entry"));
    fb.set_current_block(entry);
    let (_, g) = fb.push(Instr::FunctionRef { name: "g".into() }, Some(thin));
    let (_, pa) = fb.push(
        Instr::PartialApply {
            callee: g.unwrap(),
            args: OperandList::new(),
            substitutions: vec![],
        },
        Some(thick),
    );
    fb.push(Instr::Return { operand: pa.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::PartialApply), 0);
    assert_eq!(count_opcode(&module, fid, Opcode::ThinToThickFunction), 1);
}

#[test]
fn dead_closure_releases_its_captures() {
    let mut module = Module::new("apply");
    module.types.add_class("Ctx", None).unwrap();
    let ctx = Type::Class("Ctx".into());
    let thin = Type::function(FnSig::thin(vec![ParamInfo::owned(ctx.clone())], i64t()));
    let thick = Type::function(FnSig::thick(vec![], i64t()));

    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("c", ctx.clone())],
        ctx.clone(),
    );
    let entry = fb.create_block(Some("entry"));
    let c = fb.add_block_param(entry, Some("c"), ctx.clone());
    fb.set_current_block(entry);
    let (_, g) = fb.push(Instr::FunctionRef { name: "g".into() }, Some(thin));
    let (_, pa) = fb.push(
        Instr::PartialApply {
            callee: g.unwrap(),
            args: args(&[c]),
            substitutions: vec![],
        },
        Some(thick),
    );
    fb.push(Instr::StrongRelease { operand: pa.unwrap() }, None);
    fb.push(Instr::Return { operand: c }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);

    // Closure and its release vanish; the consumed capture is released at
    // the site where the closure died.
    assert_eq!(count_opcode(&module, fid, Opcode::PartialApply), 0);
    let f = module.function(fid);
    let release = f
        .blocks()
        .iter()
        .flat_map(|b| b.insts.iter())
        .find(|&&i| f.inst(i).instr.opcode() == Opcode::StrongRelease)
        .copied()
        .unwrap();
    let Instr::StrongRelease { operand } = f.inst(release).instr else { unreachable!() };
    assert_eq!(operand, c);
}

#[test]
fn effectless_call_with_only_counting_users_is_deleted() {
    let mut module = Module::new("apply");
    module.types.add_class("Obj", None).unwrap();
    let obj = Type::Class("Obj".into());

    // The callee: reads only, consumes its argument.
    let mut gb = FunctionBuilder::new(
        &mut module,
        "g",
        vec![Param::consumed("x", obj.clone())],
        obj.clone(),
    );
    gb.set_effects(EffectsKind::ReadOnly);
    let gentry = gb.create_block(Some("entry"));
    let gx = gb.add_block_param(gentry, Some("x"), obj.clone());
    gb.set_current_block(gentry);
    gb.push(Instr::Return { operand: gx }, None);
    gb.finish().unwrap();

    let g_sig = Type::function(FnSig::thin(vec![ParamInfo::owned(obj.clone())], obj.clone()));
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("c", obj.clone())],
        obj.clone(),
    );
    let entry = fb.create_block(Some("entry"));
    let c = fb.add_block_param(entry, Some("c"), obj.clone());
    fb.set_current_block(entry);
    let (_, g) = fb.push(Instr::FunctionRef { name: "g".into() }, Some(g_sig));
    let (_, r) = fb.push(
        Instr::Apply {
            callee: g.unwrap(),
            args: args(&[c]),
            substitutions: vec![],
            transparent: false,
        },
        Some(obj.clone()),
    );
    fb.push(Instr::StrongRetain { operand: r.unwrap() }, None);
    fb.push(Instr::StrongRelease { operand: r.unwrap() }, None);
    fb.push(Instr::Return { operand: c }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);

    // Call and counting users are gone; the consumed argument got its
    // balancing release.
    assert_eq!(count_opcode(&module, fid, Opcode::Apply), 0);
    let f = module.function(fid);
    let release = f
        .blocks()
        .iter()
        .flat_map(|b| b.insts.iter())
        .find(|&&i| f.inst(i).instr.opcode() == Opcode::StrongRelease)
        .copied()
        .unwrap();
    let Instr::StrongRelease { operand } = f.inst(release).instr else { unreachable!() };
    assert_eq!(operand, c);
}

#[test]
fn cond_fail_on_constant_false_is_erased() {
    let mut module = Module::new("apply");
    let mut fb =
        FunctionBuilder::new(&mut module, "f", vec![Param::new("x", i64t())], i64t());
    let entry = fb.create_block(Some("entry"));
    let x = fb.add_block_param(entry, Some("x"), i64t());
    fb.set_current_block(entry);
    let (_, zero) = fb.push(Instr::IntegerLiteral { value: 0 }, Some(Type::BOOL));
    fb.push(Instr::CondFail { operand: zero.unwrap() }, None);
    fb.push(Instr::Return { operand: x }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::CondFail), 0);
}

#[test]
fn assert_stripping_erases_every_cond_fail() {
    let mut module = Module::new("apply");
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("c", Type::BOOL), Param::new("x", i64t())],
        i64t(),
    );
    let entry = fb.create_block(Some("entry"));
    let c = fb.add_block_param(entry, Some("c"), Type::BOOL);
    let x = fb.add_block_param(entry, Some("x"), i64t());
    fb.set_current_block(entry);
    fb.push(Instr::CondFail { operand: c }, None);
    fb.push(Instr::Return { operand: x }, None);
    let fid = fb.finish().unwrap();

    assert!(!run_combine(&mut module, fid, &CombineOptions::default()));
    let options = CombineOptions { remove_runtime_asserts: true };
    assert!(run_combine(&mut module, fid, &options));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::CondFail), 0);
}
