//! End-to-end tests over the compiler façade, driving the same host
//! context a TTRPG embedder would register: a spell list, a spell
//! slot, and a couple of host functions.

use grimoire::{Compiler, ContextTypes, Type};
use pretty_assertions::assert_eq;

fn spell_type() -> Type {
    Compiler::create_object_type(
        "Spell",
        vec![
            ("name".to_string(), Type::string()),
            ("level".to_string(), Type::number()),
            ("damage".to_string(), Type::string()),
        ],
    )
}

fn host_compiler() -> Compiler {
    let mut context = ContextTypes::new();
    context.insert(
        "casting".to_string(),
        Compiler::create_object_type(
            "SpellCasting",
            vec![(
                "spells".to_string(),
                Compiler::create_array_type(spell_type()),
            )],
        ),
    );
    context.insert(
        "slot".to_string(),
        Compiler::create_object_type(
            "SpellSlot",
            vec![
                ("current".to_string(), Type::number()),
                ("level".to_string(), Type::number()),
            ],
        ),
    );
    let mut compiler = Compiler::new(context);
    compiler.register_type("Spell", spell_type());
    compiler
}

#[test]
fn plain_return() {
    let mut compiler = Compiler::new(ContextTypes::new());
    let output = compiler.compile("return 42").unwrap();
    assert_eq!(output.return_type, "number");
    assert_eq!(output.code, "return 42;");
}

#[test]
fn spell_filter_awaits_the_host_list() {
    let mut compiler = host_compiler();
    let source = "const filtered = casting.spells.filter(s => s.level <= 2)\nreturn filtered";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.return_type, "Spell[]");
    assert_eq!(
        output.code,
        "const filtered = (await casting.spells).filter((s) => (s.level <= 2));\nreturn filtered;"
    );
}

#[test]
fn early_null_return_unions_with_the_filter_result() {
    let mut compiler = host_compiler();
    let source = "if slot.current <= 0 { return null }\nreturn casting.spells.filter(s => s.level == slot.level)";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.return_type, "Spell[] | null");
}

#[test]
fn declared_function_return_is_checked_and_used() {
    let mut compiler = host_compiler();
    let source = "fn getSpellsForLevel(level: number) -> Spell[] { return casting.spells.filter(s => s.level <= level) }\nreturn getSpellsForLevel(3)";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.return_type, "Spell[]");
    assert!(output.code.starts_with("function getSpellsForLevel(level)"));
    assert!(output.code.ends_with("return getSpellsForLevel(3);"));
}

#[test]
fn annotated_literal_gets_type_tag() {
    let mut compiler = host_compiler();
    let source = "const spell: Spell = { name: \"X\", level: 1, damage: \"\" }\nreturn spell";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.return_type, "Spell");
    assert_eq!(
        output.code,
        "const spell = { _type: \"Spell\", name: \"X\", level: 1, damage: \"\" };\nreturn spell;"
    );
}

#[test]
fn async_function_round_trip() {
    let mut compiler = host_compiler();
    let source = "async fn fetchSpells() -> Promise<Spell[]> { return casting.spells }\nreturn await fetchSpells()";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.return_type, "Spell[]");
    assert_eq!(
        output.code,
        "async function fetchSpells() {\n  return (await casting).spells;\n}\nreturn await fetchSpells();"
    );
}

#[test]
fn empty_program() {
    let mut compiler = Compiler::new(ContextTypes::new());
    let output = compiler.compile("").unwrap();
    assert_eq!(output.return_type, "unknown");
    assert_eq!(output.code, "");
}

#[test]
fn empty_array_literal_is_unknown_array() {
    let mut compiler = Compiler::new(ContextTypes::new());
    let output = compiler.compile("return []").unwrap();
    assert_eq!(output.return_type, "unknown[]");
}

#[test]
fn nested_unions_flatten_without_dedup() {
    let mut compiler = Compiler::new(ContextTypes::new());
    let source = "if x { return 1 }\nif y { return true ? 2 : \"two\" }\nreturn 3";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.return_type, "number | number | string | number");
}

#[test]
fn narrower_declared_annotation_accepts_assignable_inferred() {
    let mut compiler = host_compiler();
    // inferred Spell[] is assignable to the wider declared union
    let source = "fn maybeSpells() -> Spell[] | null { return casting.spells }\nreturn maybeSpells()";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.return_type, "Spell[] | null");
}

#[test]
fn incompatible_declared_annotation_is_rejected() {
    let mut compiler = host_compiler();
    let source = "fn broken() -> number { return casting.spells }";
    let err = compiler.compile(source).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Function broken returns Spell[] but declared number"
    );
}

#[test]
fn await_outside_async_context_errors() {
    let mut compiler = host_compiler();
    let err = compiler
        .compile("fn f() { return await casting.spells }")
        .unwrap_err();
    assert_eq!(err.to_string(), "await can only be used in async functions");
}

#[test]
fn top_level_await_is_allowed() {
    let mut compiler = host_compiler();
    let output = compiler.compile("return await casting.spells").unwrap();
    assert_eq!(output.return_type, "Spell[]");
}

#[test]
fn for_await_over_host_function() {
    let mut compiler = host_compiler();
    compiler.register_function(
        "loadSpells",
        vec![],
        Type::promise(Compiler::create_array_type(spell_type())),
        true,
    );
    let source = "for await s in loadSpells() { return s.name }";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.return_type, "string");
    // host functions are not script-declared, so the read suspends
    assert!(output
        .code
        .starts_with("for await (const s of (await loadSpells)())"));
}

#[test]
fn for_await_over_plain_array_errors() {
    let mut compiler = host_compiler();
    let err = compiler
        .compile("for await s in casting.spells { return s }")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "for await…of requires an async iterable (Promise<T[]>)"
    );
}

#[test]
fn parse_errors_embed_the_line_number() {
    let mut compiler = Compiler::new(ContextTypes::new());
    let err = compiler.compile("let x = 1\nlet = 2").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("at line 2"), "message was: {}", message);
}

#[test]
fn lex_errors_embed_line_and_column() {
    let mut compiler = Compiler::new(ContextTypes::new());
    let err = compiler.compile("return 1 @ 2").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unexpected character '@' at line 1, column 10"
    );
}

#[test]
fn slot_update_awaits_only_the_root_on_the_left() {
    let mut compiler = host_compiler();
    let source = "slot.current = slot.current - 1\nreturn slot.current";
    let output = compiler.compile(source).unwrap();
    assert_eq!(
        output.code,
        "(await slot).current = ((await slot).current - 1);\nreturn (await slot).current;"
    );
    assert_eq!(output.return_type, "number");
}

#[test]
fn type_declarations_compile_to_nothing() {
    let mut compiler = Compiler::new(ContextTypes::new());
    let source = "type Hp = number\ninterface Slot { current: number }\nreturn 1";
    let output = compiler.compile(source).unwrap();
    assert_eq!(output.code, "return 1;");
}

#[test]
fn registry_survives_between_compiles() {
    let mut compiler = Compiler::new(ContextTypes::new());
    compiler
        .compile("interface Slot { current: number, level: number }")
        .unwrap();
    let output = compiler
        .compile("const s: Slot = { current: 2, level: 1 }\nreturn s")
        .unwrap();
    assert_eq!(output.return_type, "Slot");
    assert!(output.code.contains("_type: \"Slot\""));
}
