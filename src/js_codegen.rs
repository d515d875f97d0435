use crate::ast::{Expression, Literal, Program, Statement, TypeAnnotation};
use std::collections::HashSet;

/// Array methods the emitter recognizes when they terminate a member
/// chain rooted at a host global: the await lands before the method so
/// the receiver is the resolved array.
const ARRAY_METHODS: [&str; 11] = [
    "find",
    "filter",
    "map",
    "slice",
    "concat",
    "at",
    "findIndex",
    "indexOf",
    "some",
    "every",
    "includes",
];

/// Emits target code for the embedding runtime. Tracks lexical scopes
/// to tell locally-declared names from host globals: host globals are
/// thenables, so reads of them in async context suspend at the read
/// site.
pub struct JsCodeGen {
    scopes: Vec<HashSet<String>>,
    async_stack: Vec<bool>,
}

impl JsCodeGen {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashSet::new()],
            // the host wraps top-level code in an async function
            async_stack: vec![true],
        }
    }

    pub fn emit_program(&mut self, program: &Program) -> String {
        self.scopes = vec![HashSet::new()];
        self.async_stack = vec![true];

        let lines: Vec<String> = program
            .statements
            .iter()
            .map(|statement| self.emit_statement(statement, 0))
            .filter(|line| !line.is_empty())
            .collect();
        lines.join("\n")
    }

    fn emit_statement(&mut self, statement: &Statement, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        match statement {
            // type declarations are erased at runtime
            Statement::TypeDecl { .. } | Statement::InterfaceDecl { .. } => String::new(),
            Statement::VarDecl {
                name,
                constant,
                annotation,
                value,
            } => {
                let keyword = if *constant { "const" } else { "let" };
                let value_code = match (annotation, value) {
                    (
                        Some(TypeAnnotation::Reference(type_name)),
                        Expression::Object { fields, .. },
                    ) => self.emit_object(fields, Some(type_name.as_str())),
                    _ => self.emit_expression(value),
                };
                self.declare(name);
                format!("{}{} {} = {};", ind, keyword, name, value_code)
            }
            Statement::FuncDecl {
                name,
                params,
                body,
                is_async,
                ..
            } => {
                self.declare(name);
                self.scopes.push(params.iter().map(|p| p.name.clone()).collect());
                self.async_stack.push(*is_async);
                let block = self.emit_block(body, indent);
                self.async_stack.pop();
                self.scopes.pop();

                let prefix = if *is_async { "async " } else { "" };
                let param_names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
                format!(
                    "{}{}function {}({}) {}",
                    ind,
                    prefix,
                    name,
                    param_names.join(", "),
                    block
                )
            }
            Statement::Return(value) => match value {
                Some(expression) => format!("{}return {};", ind, self.emit_expression(expression)),
                None => format!("{}return;", ind),
            },
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition_code = self.emit_expression(condition);
                let then_block = self.emit_block(then_body, indent);
                match else_body {
                    Some(else_statements) => {
                        let else_block = self.emit_block(else_statements, indent);
                        format!(
                            "{}if ({}) {} else {}",
                            ind, condition_code, then_block, else_block
                        )
                    }
                    None => format!("{}if ({}) {}", ind, condition_code, then_block),
                }
            }
            Statement::For {
                variable,
                iterable,
                body,
                is_await,
            } => {
                let iterable_code = self.emit_expression(iterable);
                let mut scope = HashSet::new();
                scope.insert(variable.clone());
                self.scopes.push(scope);
                let block = self.emit_block(body, indent);
                self.scopes.pop();

                let keyword = if *is_await { "for await" } else { "for" };
                format!(
                    "{}{} (const {} of {}) {}",
                    ind, keyword, variable, iterable_code, block
                )
            }
            Statement::Expression(expression) => {
                format!("{}{};", ind, self.emit_expression(expression))
            }
        }
    }

    fn emit_block(&mut self, body: &[Statement], indent: usize) -> String {
        let lines: Vec<String> = body
            .iter()
            .map(|statement| self.emit_statement(statement, indent + 1))
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            "{}".to_string()
        } else {
            format!("{{\n{}\n{}}}", lines.join("\n"), "  ".repeat(indent))
        }
    }

    fn emit_expression(&mut self, expression: &Expression) -> String {
        match expression {
            Expression::Literal(literal) => Self::emit_literal(literal),
            Expression::Identifier(name) => {
                if !self.is_declared(name) && self.in_async() {
                    format!("await {}", name)
                } else {
                    name.clone()
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                format!(
                    "({} {} {})",
                    self.emit_expression(left),
                    operator.as_str(),
                    self.emit_expression(right)
                )
            }
            Expression::Unary { operator, operand } => {
                format!("({}{})", operator.as_str(), self.emit_expression(operand))
            }
            Expression::Array(elements) => {
                let parts: Vec<String> = elements
                    .iter()
                    .map(|element| self.emit_expression(element))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            Expression::Object {
                fields,
                inferred_type,
            } => self.emit_object(fields, inferred_type.as_deref()),
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                format!(
                    "({} ? {} : {})",
                    self.emit_expression(condition),
                    self.emit_expression(then_branch),
                    self.emit_expression(else_branch)
                )
            }
            Expression::Arrow {
                params,
                body,
                is_async,
            } => {
                self.scopes.push(params.iter().cloned().collect());
                self.async_stack.push(*is_async);
                let body_code = self.emit_expression(body);
                self.async_stack.pop();
                self.scopes.pop();

                let prefix = if *is_async { "async " } else { "" };
                format!("{}({}) => {}", prefix, params.join(", "), body_code)
            }
            Expression::Assignment { target, value } => {
                let target_code = match target.as_ref() {
                    // the LHS must stay a valid assignable location,
                    // so no await is placed on an identifier target
                    Expression::Identifier(name) => name.clone(),
                    Expression::Member {
                        object,
                        property,
                        computed,
                    } => self.emit_member_lhs(object, property, *computed),
                    other => self.emit_expression(other),
                };
                format!("{} = {}", target_code, self.emit_expression(value))
            }
            Expression::Await(argument) => {
                format!("await {}", self.emit_expression(argument))
            }
            Expression::Call { callee, args } => self.emit_call(callee, args),
            Expression::Member {
                object,
                property,
                computed,
            } => self.emit_member(object, property, *computed),
        }
    }

    fn emit_call(&mut self, callee: &Expression, args: &[Expression]) -> String {
        let parts: Vec<String> = args.iter().map(|arg| self.emit_expression(arg)).collect();
        let args_code = parts.join(", ");

        match callee {
            Expression::Identifier(name) => {
                if !self.is_declared(name) && self.in_async() {
                    format!("(await {})({})", name, args_code)
                } else {
                    format!("{}({})", name, args_code)
                }
            }
            Expression::Member {
                object,
                property,
                computed,
            } => {
                if let Some(method) = property_key(property, *computed) {
                    if ARRAY_METHODS.contains(&method.as_str()) && self.is_host_chain(object) {
                        // await before the method so the receiver is
                        // the resolved array
                        return format!(
                            "(await {}).{}({})",
                            self.emit_plain_chain(object),
                            method,
                            args_code
                        );
                    }
                }
                format!(
                    "{}({})",
                    self.emit_member(object, property, *computed),
                    args_code
                )
            }
            _ => format!("{}({})", self.emit_expression(callee), args_code),
        }
    }

    fn emit_member(&mut self, object: &Expression, property: &Expression, computed: bool) -> String {
        // a trailing numeric index awaits the whole prefix so the
        // awaited value is the array being indexed
        if computed {
            if let Expression::Literal(Literal::Number(n)) = property {
                if self.is_host_chain(object) {
                    return format!(
                        "(await {})[{}]",
                        self.emit_plain_chain(object),
                        format_number(*n)
                    );
                }
            }
        }

        if self.is_host_chain(object) {
            return format!(
                "{}{}",
                self.emit_awaited_chain(object),
                render_segment(property, computed)
            );
        }

        format!(
            "{}{}",
            self.emit_expression(object),
            render_segment(property, computed)
        )
    }

    /// Member target of an assignment: only the chain root is awaited,
    /// whatever the trailing segment looks like.
    fn emit_member_lhs(
        &mut self,
        object: &Expression,
        property: &Expression,
        computed: bool,
    ) -> String {
        if self.is_host_chain(object) {
            format!(
                "{}{}",
                self.emit_awaited_chain(object),
                render_segment(property, computed)
            )
        } else {
            format!(
                "{}{}",
                self.emit_expression(object),
                render_segment(property, computed)
            )
        }
    }

    /// Render a member spine with `(await root)` in place of the base
    /// identifier.
    fn emit_awaited_chain(&mut self, expression: &Expression) -> String {
        match expression {
            Expression::Identifier(name) => format!("(await {})", name),
            Expression::Member {
                object,
                property,
                computed,
            } => format!(
                "{}{}",
                self.emit_awaited_chain(object),
                render_segment(property, *computed)
            ),
            other => self.emit_expression(other),
        }
    }

    /// Render a member spine with no awaits at all; used when the
    /// caller wraps the whole chain in `(await …)`.
    fn emit_plain_chain(&mut self, expression: &Expression) -> String {
        match expression {
            Expression::Identifier(name) => name.clone(),
            Expression::Member {
                object,
                property,
                computed,
            } => format!(
                "{}{}",
                self.emit_plain_chain(object),
                render_segment(property, *computed)
            ),
            other => self.emit_expression(other),
        }
    }

    fn emit_object(&mut self, fields: &[(String, Expression)], type_name: Option<&str>) -> String {
        let mut parts = Vec::new();
        if let Some(name) = type_name {
            if !fields.iter().any(|(key, _)| key == "_type") {
                parts.push(format!("_type: \"{}\"", name));
            }
        }
        for (key, value) in fields {
            parts.push(format!("{}: {}", key, self.emit_expression(value)));
        }
        if parts.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", parts.join(", "))
        }
    }

    fn emit_literal(literal: &Literal) -> String {
        match literal {
            Literal::Number(n) => format_number(*n),
            // emitted double-quoted without escape re-processing
            Literal::String(s) => format!("\"{}\"", s),
            Literal::Bool(b) => b.to_string(),
            Literal::Null => "null".to_string(),
        }
    }

    /// Is this the spine of a member chain rooted at an identifier the
    /// host will resolve, read in async context?
    fn is_host_chain(&self, expression: &Expression) -> bool {
        match chain_root(expression) {
            Some(root) => !self.is_declared(root) && self.in_async(),
            None => false,
        }
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(name))
    }

    fn in_async(&self) -> bool {
        *self.async_stack.last().unwrap_or(&true)
    }
}

impl Default for JsCodeGen {
    fn default() -> Self {
        Self::new()
    }
}

fn chain_root(expression: &Expression) -> Option<&str> {
    match expression {
        Expression::Identifier(name) => Some(name),
        Expression::Member { object, .. } => chain_root(object),
        _ => None,
    }
}

fn property_key(property: &Expression, computed: bool) -> Option<String> {
    match property {
        Expression::Identifier(name) if !computed => Some(name.clone()),
        Expression::Literal(literal) if computed => Some(literal.as_property_key()),
        _ => None,
    }
}

fn render_segment(property: &Expression, computed: bool) -> String {
    if computed {
        match property {
            Expression::Literal(Literal::Number(n)) => format!("[{}]", format_number(*n)),
            Expression::Literal(Literal::String(s)) => format!("[\"{}\"]", s),
            Expression::Literal(literal) => format!("[{}]", JsCodeGen::emit_literal(literal)),
            _ => "[?]".to_string(),
        }
    } else {
        match property {
            Expression::Identifier(name) => format!(".{}", name),
            _ => String::new(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn emit(input: &str) -> String {
        let tokens = Lexer::new(input).tokenize().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        JsCodeGen::new().emit_program(&program)
    }

    #[test]
    fn test_return_literal() {
        assert_eq!(emit("return 42"), "return 42;");
        assert_eq!(emit("return \"fire\""), "return \"fire\";");
        assert_eq!(emit("return null"), "return null;");
    }

    #[test]
    fn test_empty_program() {
        assert_eq!(emit(""), "");
    }

    #[test]
    fn test_type_declarations_are_erased() {
        assert_eq!(emit("type Spell = { name: string }"), "");
        assert_eq!(emit("interface Slot { current: number }"), "");
    }

    #[test]
    fn test_declared_variable_is_not_awaited() {
        let code = emit("const hp = 10\nreturn hp");
        assert_eq!(code, "const hp = 10;\nreturn hp;");
    }

    #[test]
    fn test_undeclared_identifier_is_awaited() {
        assert_eq!(emit("return casting"), "return await casting;");
    }

    #[test]
    fn test_member_chain_awaits_the_root() {
        assert_eq!(emit("return casting.spells"), "return (await casting).spells;");
        assert_eq!(
            emit("return casting.slot.level"),
            "return (await casting).slot.level;"
        );
    }

    #[test]
    fn test_trailing_numeric_index_awaits_the_prefix() {
        assert_eq!(
            emit("return casting.spells[0]"),
            "return (await casting.spells)[0];"
        );
        // an index in the middle of a chain goes back to root awaiting
        assert_eq!(
            emit("return casting.spells[0].name"),
            "return (await casting).spells[0].name;"
        );
    }

    #[test]
    fn test_array_method_awaits_the_receiver() {
        let code = emit("const filtered = casting.spells.filter(s => s.level <= 2)\nreturn filtered");
        assert_eq!(
            code,
            "const filtered = (await casting.spells).filter((s) => (s.level <= 2));\nreturn filtered;"
        );
    }

    #[test]
    fn test_declared_receiver_needs_no_await() {
        let code = emit("const spells = [1, 2]\nreturn spells.filter(s => s)");
        assert_eq!(code, "const spells = [1, 2];\nreturn spells.filter((s) => s);");
    }

    #[test]
    fn test_undeclared_callee_is_awaited() {
        assert_eq!(emit("return roll(20)"), "return (await roll)(20);");
        let code = emit("fn roll(n) { return n }\nreturn roll(20)");
        assert!(code.ends_with("return roll(20);"));
    }

    #[test]
    fn test_arrow_parameters_shadow_host_globals() {
        let code = emit("return casting.spells.map(casting => casting)");
        assert_eq!(code, "return (await casting.spells).map((casting) => casting);");
    }

    #[test]
    fn test_function_declaration() {
        let code = emit("fn double(n) { return n * 2 }");
        assert_eq!(code, "function double(n) {\n  return (n * 2);\n}");
    }

    #[test]
    fn test_async_function_declaration() {
        let code = emit("async fn load() { return casting.spells }");
        assert_eq!(
            code,
            "async function load() {\n  return (await casting).spells;\n}"
        );
    }

    #[test]
    fn test_sync_function_body_has_no_awaits() {
        let code = emit("fn peek() { return casting.spells }");
        assert_eq!(code, "function peek() {\n  return casting.spells;\n}");
    }

    #[test]
    fn test_if_else() {
        let code = emit("if hp <= 0 { return null } else { return hp }");
        assert_eq!(
            code,
            "if ((await hp <= 0)) {\n  return null;\n} else {\n  return await hp;\n}"
        );
    }

    #[test]
    fn test_for_loop_scopes_the_variable() {
        let code = emit("for s in casting.spells { return s }");
        assert_eq!(
            code,
            "for (const s of (await casting).spells) {\n  return s;\n}"
        );
    }

    #[test]
    fn test_for_await_loop() {
        let code = emit("for await s in fetchSpells() { return s }");
        assert_eq!(
            code,
            "for await (const s of (await fetchSpells)()) {\n  return s;\n}"
        );
    }

    #[test]
    fn test_object_literal_type_injection_from_annotation() {
        let code = emit("const spell: Spell = { name: \"X\", level: 1, damage: \"\" }");
        assert_eq!(
            code,
            "const spell = { _type: \"Spell\", name: \"X\", level: 1, damage: \"\" };"
        );
    }

    #[test]
    fn test_existing_type_field_is_not_overwritten() {
        let code = emit("const spell: Spell = { _type: \"Cantrip\", name: \"X\" }");
        assert_eq!(code, "const spell = { _type: \"Cantrip\", name: \"X\" };");
    }

    #[test]
    fn test_assignment_to_identifier_has_no_await() {
        assert_eq!(emit("hp = 10"), "hp = 10;");
    }

    #[test]
    fn test_assignment_to_member_awaits_only_the_root() {
        assert_eq!(
            emit("slot.current = slot.current - 1"),
            "(await slot).current = ((await slot).current - 1);"
        );
    }

    #[test]
    fn test_conditional_and_unary() {
        assert_eq!(emit("return hp > 0 ? hp : 0"), "return ((await hp > 0) ? await hp : 0);");
        assert_eq!(emit("return !done"), "return (!await done);");
    }

    #[test]
    fn test_explicit_await_is_verbatim() {
        let code = emit("async fn load() { return 1 }\nreturn await load()");
        assert!(code.ends_with("return await load();"));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(emit("return 2.5"), "return 2.5;");
        assert_eq!(emit("return -3"), "return -3;");
        assert_eq!(emit("return 10"), "return 10;");
    }
}
