use crate::ast::{Expression, Program, Statement};
use crate::error::CompileResult;
use crate::js_codegen::JsCodeGen;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::type_checker::TypeChecker;
use crate::types::Type;
use serde::Serialize;
use std::collections::HashMap;

/// Host context bindings: name → semantic type, seeded into the top
/// symbol scope.
pub type ContextTypes = HashMap<String, Type>;

#[derive(Debug, Clone, Serialize)]
pub struct CompileOutput {
    #[serde(rename = "returnType")]
    pub return_type: String,
    pub code: String,
}

/// Compiler façade. Owns the seeded symbol table and the custom-type
/// registry; both survive across `compile` calls, so types registered
/// by the host or declared by earlier scripts stay visible.
pub struct Compiler {
    checker: TypeChecker,
}

impl Compiler {
    pub fn new(context: ContextTypes) -> Self {
        Self {
            checker: TypeChecker::new(context),
        }
    }

    /// Add or replace an entry in the custom-type registry.
    pub fn register_type(&mut self, name: &str, ty: Type) {
        self.checker.register_type(name, ty);
    }

    /// Seed the symbol table with a named host function.
    pub fn register_function(
        &mut self,
        name: &str,
        params: Vec<Type>,
        return_type: Type,
        is_async: bool,
    ) {
        self.checker.register_function(name, params, return_type, is_async);
    }

    pub fn compile(&mut self, source: &str) -> CompileResult<CompileOutput> {
        log::debug!("compiling {} bytes of source", source.len());
        let tokens = Lexer::new(source).tokenize()?;
        log::debug!("lexed {} tokens", tokens.len());
        let mut program = Parser::new(tokens).parse()?;
        let return_type = self.checker.infer_return_type(&program)?;
        log::debug!("program return type: {}", return_type);
        self.annotate_object_literals(&mut program);
        let code = JsCodeGen::new().emit_program(&program);
        Ok(CompileOutput {
            return_type: return_type.to_string(),
            code,
        })
    }

    pub fn create_object_type(name: &str, fields: Vec<(String, Type)>) -> Type {
        Type::Object {
            name: Some(name.to_string()),
            fields,
        }
    }

    pub fn create_array_type(element: Type) -> Type {
        Type::array(element)
    }

    /// Tag object literals whose shape matches a registered named type
    /// so the emitter can inject `_type`.
    fn annotate_object_literals(&mut self, program: &mut Program) {
        let mut statements = std::mem::take(&mut program.statements);
        for statement in &mut statements {
            self.annotate_statement(statement);
        }
        program.statements = statements;
    }

    fn annotate_statement(&mut self, statement: &mut Statement) {
        match statement {
            Statement::VarDecl { value, .. } => self.annotate_expression(value),
            Statement::FuncDecl { body, .. } => {
                for statement in body {
                    self.annotate_statement(statement);
                }
            }
            Statement::Return(Some(value)) => self.annotate_expression(value),
            Statement::Return(None) => {}
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                self.annotate_expression(condition);
                for statement in then_body {
                    self.annotate_statement(statement);
                }
                if let Some(else_statements) = else_body {
                    for statement in else_statements {
                        self.annotate_statement(statement);
                    }
                }
            }
            Statement::For { iterable, body, .. } => {
                self.annotate_expression(iterable);
                for statement in body {
                    self.annotate_statement(statement);
                }
            }
            Statement::Expression(expression) => self.annotate_expression(expression),
            Statement::TypeDecl { .. } | Statement::InterfaceDecl { .. } => {}
        }
    }

    fn annotate_expression(&mut self, expression: &mut Expression) {
        match expression {
            Expression::Object {
                fields,
                inferred_type,
            } => {
                for (_, value) in fields.iter_mut() {
                    self.annotate_expression(value);
                }
                if inferred_type.is_none() {
                    *inferred_type = self.match_named_type(fields);
                }
            }
            Expression::Binary { left, right, .. } => {
                self.annotate_expression(left);
                self.annotate_expression(right);
            }
            Expression::Unary { operand, .. } => self.annotate_expression(operand),
            Expression::Call { callee, args } => {
                self.annotate_expression(callee);
                for arg in args {
                    self.annotate_expression(arg);
                }
            }
            Expression::Member { object, .. } => self.annotate_expression(object),
            Expression::Array(elements) => {
                for element in elements {
                    self.annotate_expression(element);
                }
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.annotate_expression(condition);
                self.annotate_expression(then_branch);
                self.annotate_expression(else_branch);
            }
            Expression::Arrow { body, .. } => self.annotate_expression(body),
            Expression::Assignment { target, value } => {
                self.annotate_expression(target);
                self.annotate_expression(value);
            }
            Expression::Await(argument) => self.annotate_expression(argument),
            Expression::Literal(_) | Expression::Identifier(_) => {}
        }
    }

    /// A literal matches a registered named object type when the field
    /// names line up exactly and every registered field accepts the
    /// literal's field. First registered match wins.
    fn match_named_type(&mut self, fields: &[(String, Expression)]) -> Option<String> {
        let mut field_types = Vec::new();
        for (key, value) in fields {
            let ty = self
                .checker
                .infer_expression(value)
                .unwrap_or(Type::Unknown);
            field_types.push((key.clone(), ty));
        }

        for (name, ty) in self.checker.registry() {
            if let Type::Object {
                fields: registry_fields,
                ..
            } = ty
            {
                let matches = registry_fields.len() == field_types.len()
                    && registry_fields.iter().all(|(key, target)| {
                        field_types
                            .iter()
                            .find(|(field, _)| field == key)
                            .map_or(false, |(_, source)| TypeChecker::is_assignable(source, target))
                    });
                if matches {
                    return Some(name.clone());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
        let mut compiler = Compiler::new(context);
        compiler.register_type("Spell", spell_type());
        compiler
    }

    #[test]
    fn test_compile_returns_type_and_code() {
        let mut compiler = Compiler::new(ContextTypes::new());
        let output = compiler.compile("return 42").unwrap();
        assert_eq!(output.return_type, "number");
        assert_eq!(output.code, "return 42;");
    }

    #[test]
    fn test_compile_error_carries_message() {
        let mut compiler = Compiler::new(ContextTypes::new());
        let err = compiler.compile("let x: number = \"hi\"").unwrap_err();
        assert_eq!(err.to_string(), "Cannot assign string to number");
    }

    #[test]
    fn test_returned_literal_gets_type_tag() {
        let mut compiler = host_compiler();
        let output = compiler
            .compile("return { name: \"Fire Bolt\", level: 0, damage: \"1d10\" }")
            .unwrap();
        // the literal itself types structurally; the tag comes from
        // the shape matching the registered Spell type
        assert_eq!(
            output.return_type,
            "{ name: string, level: number, damage: string }"
        );
        assert!(output.code.contains("_type: \"Spell\""));
    }

    #[test]
    fn test_literal_with_extra_fields_is_not_tagged() {
        let mut compiler = host_compiler();
        let output = compiler
            .compile("return { name: \"X\", level: 1, damage: \"\", school: \"fire\" }")
            .unwrap();
        assert!(!output.code.contains("_type"));
    }

    #[test]
    fn test_script_declared_types_survive_across_compiles() {
        let mut compiler = Compiler::new(ContextTypes::new());
        compiler
            .compile("interface Slot { current: number, level: number }")
            .unwrap();
        let output = compiler
            .compile("const s: Slot = { current: 1, level: 2 }\nreturn s")
            .unwrap();
        assert_eq!(output.return_type, "Slot");
        assert!(output.code.contains("_type: \"Slot\""));
    }

    #[test]
    fn test_registered_function_is_callable() {
        let mut compiler = Compiler::new(ContextTypes::new());
        compiler.register_function(
            "rollDice",
            vec![Type::string()],
            Type::promise(Type::number()),
            true,
        );
        let output = compiler.compile("return await rollDice(\"1d20\")").unwrap();
        assert_eq!(output.return_type, "number");
    }

    #[test]
    fn test_output_serializes_with_camel_case_key() {
        let output = CompileOutput {
            return_type: "number".to_string(),
            code: "return 1;".to_string(),
        };
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["returnType"], "number");
        assert_eq!(value["code"], "return 1;");
    }
}
