//! End-to-end emission checks: literal programs in, expected bytecode out.

use ozma::{Compilation, Opcode, Operand, RegisterKind, Store, StoreData, compile_unit};
use pretty_assertions::assert_eq;

fn compile(code: &str) -> (Store, Compilation) {
    let mut store = Store::new();
    let compilation = compile_unit(code, &mut store).expect("compiles");
    (store, compilation)
}

fn ops(compilation: &Compilation) -> Vec<Opcode> {
    compilation.segment.instructions().iter().map(|i| i.op).collect()
}

#[test]
fn literal_statement_produces_no_bytecode() {
    let (store, compilation) = compile("1");
    assert!(compilation.segment.is_empty());
    let StoreData::Integer(value) = store.get(compilation.value) else {
        panic!("expected integer result");
    };
    assert_eq!(value.to_string(), "1");
}

#[test]
fn top_level_unification_emits_one_unify() {
    let (store, compilation) = compile("X = 1");
    assert_eq!(ops(&compilation), vec![Opcode::Unify]);

    let instruction = &compilation.segment.instructions()[0];
    let Operand::Immediate(global) = instruction.operands[0] else {
        panic!("expected immediate global, got {:?}", instruction.operands[0]);
    };
    assert_eq!(store.get(global), &StoreData::Variable);
    let Operand::Immediate(literal) = instruction.operands[1] else {
        panic!("expected immediate literal, got {:?}", instruction.operands[1]);
    };
    assert_eq!(store.int_value(literal), Some(1));
}

#[test]
fn chained_unification_unifies_against_the_first_operand() {
    let (store, compilation) = compile("X = 1 = Y");
    assert_eq!(ops(&compilation), vec![Opcode::Unify, Opcode::Unify]);

    let instructions = compilation.segment.instructions();
    // Both unifications reference the first operand X.
    assert_eq!(instructions[0].operands[0], instructions[1].operands[0]);
    let Operand::Immediate(y) = instructions[1].operands[1] else {
        panic!("expected immediate, got {:?}", instructions[1].operands[1]);
    };
    assert_eq!(store.get(y), &StoreData::Variable);
}

#[test]
fn unify_with_k_operands_emits_k_minus_one_instructions() {
    let (_, compilation) = compile("X = 1 = Y = 2");
    assert_eq!(ops(&compilation), vec![Opcode::Unify; 3]);
}

#[test]
fn anonymous_proc_compiles_to_a_closure() {
    let (store, compilation) = compile("proc {$ X Y} X = Y end");
    assert!(compilation.segment.is_empty());

    let closure = store.as_closure(compilation.value).expect("closure result");
    assert_eq!(closure.nparams, 2);
    assert_eq!(closure.nlocals, 0);
    assert_eq!(closure.nclosures, 0);

    let body = closure.segment.instructions();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].op, Opcode::Unify);
    assert_eq!(body[0].operands[0], Operand::Register(RegisterKind::Parameter, 0));
    assert_eq!(body[0].operands[1], Operand::Register(RegisterKind::Parameter, 1));
}

#[test]
fn statement_call_allocates_one_slot_per_argument() {
    let (store, compilation) = compile("{F A B}");
    assert_eq!(
        ops(&compilation),
        vec![Opcode::NewArray, Opcode::AssignArray, Opcode::AssignArray, Opcode::Call]
    );

    let instructions = compilation.segment.instructions();
    let params = instructions[0].operands[0];
    assert_eq!(params, Operand::Register(RegisterKind::Local, 0));
    let Operand::Immediate(size) = instructions[0].operands[1] else {
        panic!("expected immediate size");
    };
    assert_eq!(store.int_value(size), Some(2));

    // Slots fill in argument order, then the callee is invoked.
    assert_eq!(instructions[1].operands[0], params);
    assert_eq!(instructions[2].operands[0], params);
    assert_eq!(instructions[3].operands[1], params);
}

#[test]
fn expression_call_adds_an_implicit_return_slot() {
    let (store, compilation) = compile("R = {F A B}");
    assert_eq!(
        ops(&compilation),
        vec![
            Opcode::NewArray,
            Opcode::AssignArray,
            Opcode::AssignArray,
            Opcode::NewVariable,
            Opcode::AssignArray,
            Opcode::Call,
            Opcode::Unify,
        ]
    );

    let instructions = compilation.segment.instructions();
    let Operand::Immediate(size) = instructions[0].operands[1] else {
        panic!("expected immediate size");
    };
    assert_eq!(store.int_value(size), Some(3));

    // The fresh return variable lands in the last slot and unifies with R.
    let placeholder = instructions[3].operands[0];
    assert_eq!(instructions[4].operands[2], placeholder);
    assert_eq!(instructions[6].op, Opcode::Unify);
    assert_eq!(instructions[6].operands[1], placeholder);
}

#[test]
fn explicit_return_parameter_keeps_the_argument_count() {
    let (store, compilation) = compile("R = {F A $ B}");
    assert_eq!(
        ops(&compilation),
        vec![
            Opcode::NewArray,
            Opcode::AssignArray,
            Opcode::NewVariable,
            Opcode::AssignArray,
            Opcode::AssignArray,
            Opcode::Call,
            Opcode::Unify,
        ]
    );

    let instructions = compilation.segment.instructions();
    let Operand::Immediate(size) = instructions[0].operands[1] else {
        panic!("expected immediate size");
    };
    assert_eq!(store.int_value(size), Some(3));

    // The '$' slot receives the fresh return variable.
    let placeholder = instructions[2].operands[0];
    let Operand::Immediate(slot) = instructions[3].operands[1] else {
        panic!("expected immediate slot index");
    };
    assert_eq!(store.int_value(slot), Some(1));
    assert_eq!(instructions[3].operands[2], placeholder);
}

#[test]
fn atom_callee_uses_the_native_call() {
    let (store, compilation) = compile("{browse X}");
    let instructions = compilation.segment.instructions();
    let call = instructions.last().expect("call instruction");
    assert_eq!(call.op, Opcode::CallNative);
    let Operand::Immediate(callee) = call.operands[0] else {
        panic!("expected immediate callee");
    };
    assert_eq!(store.get(callee), &StoreData::Atom("browse".to_owned()));
}

#[test]
fn zero_argument_statement_call_passes_no_array() {
    let (_, compilation) = compile("{F}");
    assert_eq!(ops(&compilation), vec![Opcode::Call]);
    let call = &compilation.segment.instructions()[0];
    assert_eq!(call.operands[1], Operand::Invalid);
}

#[test]
fn local_allocates_one_register_and_emits_one_unify() {
    let (store, compilation) = compile("local X in X = 1 end");
    assert_eq!(ops(&compilation), vec![Opcode::Unify]);

    let instruction = &compilation.segment.instructions()[0];
    assert_eq!(instruction.operands[0], Operand::Register(RegisterKind::Local, 0));
    let Operand::Immediate(literal) = instruction.operands[1] else {
        panic!("expected immediate literal");
    };
    assert_eq!(store.int_value(literal), Some(1));
}

#[test]
fn local_inside_a_proc_counts_toward_nlocals() {
    let (store, compilation) = compile("proc {$ X} local Y in Y = X end end");
    let closure = store.as_closure(compilation.value).expect("closure result");
    assert_eq!(closure.nparams, 1);
    assert_eq!(closure.nlocals, 1);

    let body = closure.segment.instructions();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].operands[0], Operand::Register(RegisterKind::Local, 0));
    assert_eq!(body[0].operands[1], Operand::Register(RegisterKind::Parameter, 0));
}

#[test]
fn named_proc_binds_the_name_to_the_closure() {
    let (store, compilation) = compile("proc {P X} X = 1 end");
    assert_eq!(ops(&compilation), vec![Opcode::Unify]);

    let instruction = &compilation.segment.instructions()[0];
    let Operand::Immediate(global) = instruction.operands[0] else {
        panic!("expected immediate global");
    };
    assert_eq!(store.get(global), &StoreData::Variable);
    let Operand::Immediate(closure) = instruction.operands[1] else {
        panic!("expected immediate closure");
    };
    assert!(store.as_closure(closure).is_some());
    // The closure is also the reported program value.
    assert_eq!(closure, compilation.value);
}

#[test]
fn outer_locals_are_promoted_to_closure_captures() {
    let (store, compilation) = compile("local A in proc {P X} X = A end end");
    let closure = store.as_closure(compilation.value).expect("closure result");
    assert_eq!(closure.nparams, 1);
    assert_eq!(closure.nclosures, 1);

    let body = closure.segment.instructions();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].operands[0], Operand::Register(RegisterKind::Parameter, 0));
    assert_eq!(body[0].operands[1], Operand::Register(RegisterKind::Closure, 0));
}

#[test]
fn raise_emits_one_exn_raise() {
    let (store, compilation) = compile("raise E end");
    assert_eq!(ops(&compilation), vec![Opcode::ExnRaise]);
    let Operand::Immediate(exn) = compilation.segment.instructions()[0].operands[0] else {
        panic!("expected immediate operand");
    };
    assert_eq!(store.get(exn), &StoreData::Variable);
}

#[test]
fn register_indices_stay_within_closure_counts() {
    let (store, compilation) = compile("F = f local A in proc {P X Y} local Z in Z = {F X A $ Y} end end end");
    let closure = store.as_closure(compilation.value).expect("closure result");
    for instruction in &closure.segment {
        for operand in &instruction.operands {
            if let Operand::Register(kind, index) = operand {
                let bound = match kind {
                    RegisterKind::Parameter => closure.nparams,
                    RegisterKind::Local => closure.nlocals,
                    RegisterKind::Closure => closure.nclosures,
                };
                assert!(
                    *index < bound,
                    "register {operand} out of range in {instruction}: bound {bound}"
                );
            }
        }
    }
}

#[test]
fn sequences_only_value_the_last_statement() {
    let (_, compilation) = compile("local X in X = 1 X = 2 end");
    assert_eq!(ops(&compilation), vec![Opcode::Unify, Opcode::Unify]);
}

#[test]
fn compilation_is_deterministic() {
    let code = "F = f local A in proc {P X} X = {F A $} end end {P Q}";
    let (store_a, first) = compile(code);
    let (store_b, second) = compile(code);
    assert_eq!(
        first.segment.disassemble(&store_a),
        second.segment.disassemble(&store_b)
    );
    let listing_a = store_a.as_closure(first.value).expect("closure").segment.disassemble(&store_a);
    let listing_b = store_b.as_closure(second.value).expect("closure").segment.disassemble(&store_b);
    assert_eq!(listing_a, listing_b);
}
