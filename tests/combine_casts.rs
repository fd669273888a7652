//! Cast-folding peepholes, exercised through the public builder API.

use opal::ir::function::{FunctionId, Param};
use opal::ir::instr::{BuiltinKind, Instr, Opcode};
use opal::ir::module::{FunctionBuilder, Module};
use opal::ir::types::{MetatypeRepr, Type};
use opal::pass::Pass;
use opal::{run_combine, CombineOptions, ValidatePass};

fn class_module() -> Module {
    let mut module = Module::new("casts");
    module.types.add_class("Base", None).unwrap();
    module.types.add_class("Mid", Some("Base".into())).unwrap();
    module.types.add_class("Leaf", Some("Mid".into())).unwrap();
    module
}

fn cls(name: &str) -> Type {
    Type::Class(name.into())
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

#[test]
fn upcast_chain_collapses() {
    let mut module = class_module();
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("x", cls("Leaf"))],
        cls("Base"),
    );
    let entry = fb.create_block(Some("entry"));
    let x = fb.add_block_param(entry, Some("x"), cls("Leaf"));
    fb.set_current_block(entry);
    let (_, mid) = fb.push(Instr::Upcast { operand: x }, Some(cls("Mid")));
    let (_, base) = fb.push(Instr::Upcast { operand: mid.unwrap() }, Some(cls("Base")));
    fb.push(Instr::Return { operand: base.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);

    // One upcast remains, going straight from Leaf to Base.
    assert_eq!(count_opcode(&module, fid, Opcode::Upcast), 1);
    let f = module.function(fid);
    let only = f
        .blocks()
        .iter()
        .flat_map(|b| b.insts.iter())
        .find(|&&i| f.inst(i).instr.opcode() == Opcode::Upcast)
        .copied()
        .unwrap();
    match f.inst(only).instr {
        Instr::Upcast { operand } => assert_eq!(operand, x),
        _ => unreachable!(),
    }
}

#[test]
fn unchecked_ref_cast_chain_collapses() {
    let mut module = class_module();
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("x", cls("Leaf"))],
        cls("Leaf"),
    );
    let entry = fb.create_block(Some("entry"));
    let x = fb.add_block_param(entry, Some("x"), cls("Leaf"));
    fb.set_current_block(entry);
    let (_, a) = fb.push(Instr::UncheckedRefCast { operand: x }, Some(cls("Mid")));
    let (_, b) = fb.push(
        Instr::UncheckedRefCast { operand: a.unwrap() },
        Some(cls("Leaf")),
    );
    fb.push(Instr::Return { operand: b.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);

    // The surviving cast reads the parameter directly. Leaf -> Leaf is the
    // identity, but identity elimination is a separate simplification; what
    // matters here is that the chain is gone.
    let f = module.function(fid);
    let casts: Vec<_> = f
        .blocks()
        .iter()
        .flat_map(|b| b.insts.iter())
        .filter(|&&i| f.inst(i).instr.opcode() == Opcode::UncheckedRefCast)
        .copied()
        .collect();
    assert_eq!(casts.len(), 1);
    match f.inst(casts[0]).instr {
        Instr::UncheckedRefCast { operand } => assert_eq!(operand, x),
        _ => unreachable!(),
    }
}

#[test]
fn unchecked_ref_cast_to_superclass_becomes_upcast() {
    let mut module = class_module();
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("x", cls("Leaf"))],
        cls("Base"),
    );
    let entry = fb.create_block(Some("entry"));
    let x = fb.add_block_param(entry, Some("x"), cls("Leaf"));
    fb.set_current_block(entry);
    let (_, b) = fb.push(Instr::UncheckedRefCast { operand: x }, Some(cls("Base")));
    fb.push(Instr::Return { operand: b.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::UncheckedRefCast), 0);
    assert_eq!(count_opcode(&module, fid, Opcode::Upcast), 1);
}

#[test]
fn raw_pointer_round_trip_becomes_ref_cast() {
    let mut module = class_module();
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("x", cls("Leaf"))],
        cls("Mid"),
    );
    let entry = fb.create_block(Some("entry"));
    let x = fb.add_block_param(entry, Some("x"), cls("Leaf"));
    fb.set_current_block(entry);
    let (_, raw) = fb.push(Instr::RefToRawPointer { operand: x }, Some(Type::RawPointer));
    let (_, back) = fb.push(
        Instr::RawPointerToRef { operand: raw.unwrap() },
        Some(cls("Mid")),
    );
    fb.push(Instr::Return { operand: back.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::RawPointerToRef), 0);
    assert_eq!(count_opcode(&module, fid, Opcode::UncheckedRefCast), 1);
}

#[test]
fn pointer_address_round_trip_becomes_addr_cast() {
    let mut module = Module::new("casts");
    let addr = Type::address_of(Type::Int { bits: 64 });
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("p", addr.clone())],
        addr.clone(),
    );
    let entry = fb.create_block(Some("entry"));
    let p = fb.add_block_param(entry, Some("p"), addr.clone());
    fb.set_current_block(entry);
    let (_, raw) = fb.push(Instr::AddressToPointer { operand: p }, Some(Type::RawPointer));
    let (_, back) = fb.push(
        Instr::PointerToAddress { operand: raw.unwrap() },
        Some(addr.clone()),
    );
    fb.push(Instr::Return { operand: back.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::PointerToAddress), 0);
    assert_eq!(count_opcode(&module, fid, Opcode::UncheckedAddrCast), 1);
}

#[test]
fn metatype_conversion_reissues_producer() {
    let mut module = class_module();
    let thick = Type::metatype(cls("Base"), MetatypeRepr::Thick);
    let objc = Type::metatype(cls("Base"), MetatypeRepr::ObjC);
    let mut fb = FunctionBuilder::new(&mut module, "f", vec![], objc.clone());
    let entry = fb.create_block(Some("entry"));
    fb.set_current_block(entry);
    let (_, mt) = fb.push(Instr::Metatype, Some(thick));
    let (_, conv) = fb.push(
        Instr::ThickToObjCMetatype { operand: mt.unwrap() },
        Some(objc.clone()),
    );
    fb.push(Instr::Return { operand: conv.unwrap() }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::ThickToObjCMetatype), 0);

    // The return now reads a metatype produced directly in the target
    // representation.
    let f = module.function(fid);
    let ret = f.terminator(f.entry_block().id).unwrap();
    let Instr::Return { operand } = f.inst(ret).instr else { unreachable!() };
    assert_eq!(f.value_type(operand), Some(&objc));
}

#[test]
fn checked_cast_degrades_without_runtime_asserts() {
    let mut module = class_module();
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("x", cls("Base"))],
        cls("Leaf"),
    );
    let entry = fb.create_block(Some("entry"));
    let x = fb.add_block_param(entry, Some("x"), cls("Base"));
    fb.set_current_block(entry);
    let (_, down) = fb.push(
        Instr::UnconditionalCheckedCast { operand: x },
        Some(cls("Leaf")),
    );
    fb.push(Instr::Return { operand: down.unwrap() }, None);
    let fid = fb.finish().unwrap();

    // Untouched by default.
    assert!(!run_combine(&mut module, fid, &CombineOptions::default()));
    assert_eq!(count_opcode(&module, fid, Opcode::UnconditionalCheckedCast), 1);

    let options = CombineOptions { remove_runtime_asserts: true };
    assert!(run_combine(&mut module, fid, &options));
    validate(&mut module);
    assert_eq!(count_opcode(&module, fid, Opcode::UnconditionalCheckedCast), 0);
    assert_eq!(count_opcode(&module, fid, Opcode::UncheckedRefCast), 1);
}

#[test]
fn cond_branch_on_negation_swaps_targets_and_args() {
    let mut module = Module::new("casts");
    let i1 = Type::BOOL;
    let i64t = Type::Int { bits: 64 };
    let mut fb = FunctionBuilder::new(
        &mut module,
        "f",
        vec![Param::new("c", i1.clone()), Param::new("x", i64t.clone())],
        i64t.clone(),
    );
    let entry = fb.create_block(Some("entry"));
    let on_true = fb.create_block(Some("on_true"));
    let on_false = fb.create_block(Some("on_false"));
    let c = fb.add_block_param(entry, Some("c"), i1.clone());
    let x = fb.add_block_param(entry, Some("x"), i64t.clone());
    let t_arg = fb.add_block_param(on_true, None, i64t.clone());
    let f_arg = fb.add_block_param(on_false, None, i64t.clone());

    fb.set_current_block(entry);
    let (_, one) = fb.push(Instr::IntegerLiteral { value: 1 }, Some(i1.clone()));
    let (_, xor) = fb.push(
        Instr::BuiltinRef { kind: BuiltinKind::Xor },
        Some(Type::RawPointer),
    );
    let (_, negated) = fb.push(
        Instr::Apply {
            callee: xor.unwrap(),
            args: [c, one.unwrap()].into_iter().collect(),
            substitutions: vec![],
            transparent: false,
        },
        Some(i1.clone()),
    );
    let (_, ten) = fb.push(Instr::IntegerLiteral { value: 10 }, Some(i64t.clone()));
    fb.push(
        Instr::CondBranch {
            cond: negated.unwrap(),
            true_target: on_true,
            true_args: [ten.unwrap()].into_iter().collect(),
            false_target: on_false,
            false_args: [x].into_iter().collect(),
        },
        None,
    );
    fb.set_current_block(on_true);
    fb.push(Instr::Return { operand: t_arg }, None);
    fb.set_current_block(on_false);
    fb.push(Instr::Return { operand: f_arg }, None);
    let fid = fb.finish().unwrap();

    assert!(run_combine(&mut module, fid, &CombineOptions::default()));
    validate(&mut module);

    let f = module.function(fid);
    let term = f.terminator(entry).unwrap();
    let Instr::CondBranch { cond, true_target, true_args, false_target, false_args } =
        &f.inst(term).instr
    else {
        unreachable!()
    };
    assert_eq!(*cond, c);
    assert_eq!(*true_target, on_false);
    assert_eq!(*false_target, on_true);
    assert_eq!(true_args.as_slice(), &[x]);
    assert_eq!(false_args.len(), 1);
}
