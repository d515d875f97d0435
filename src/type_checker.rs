use crate::ast::{
    BinaryOperator, Expression, Literal, Program, Statement, TypeAnnotation, UnaryOperator,
};
use crate::error::{TypeError, TypeResult};
use crate::symbol_table::ScopeStack;
use crate::types::Type;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Type checker for parsed programs. Owns the host-seeded globals and
/// the custom-type registry; both survive across `check` calls so that
/// registered and script-declared types stay visible to later compiles.
pub struct TypeChecker {
    globals: HashMap<String, Type>,
    registry: IndexMap<String, Type>,
    scopes: ScopeStack,
    in_async: bool,
    top_level_await: bool,
    return_frames: Vec<Vec<Type>>,
}

impl TypeChecker {
    pub fn new(globals: HashMap<String, Type>) -> Self {
        Self {
            scopes: ScopeStack::with_globals(globals.clone()),
            globals,
            registry: IndexMap::new(),
            in_async: true,
            // top level is treated as the body of an implicit async wrapper
            top_level_await: true,
            return_frames: vec![Vec::new()],
        }
    }

    pub fn register_type(&mut self, name: &str, ty: Type) {
        self.registry.insert(name.to_string(), ty);
    }

    pub fn register_function(
        &mut self,
        name: &str,
        params: Vec<Type>,
        return_type: Type,
        is_async: bool,
    ) {
        self.globals.insert(
            name.to_string(),
            Type::Function {
                params,
                return_type: Box::new(return_type),
                is_async,
            },
        );
    }

    pub fn registry(&self) -> &IndexMap<String, Type> {
        &self.registry
    }

    /// Walk the program in declared order, updating the symbol table
    /// and registry. The result is the type of the last statement.
    pub fn check(&mut self, program: &Program) -> TypeResult<Type> {
        self.scopes = ScopeStack::with_globals(self.globals.clone());
        self.in_async = self.top_level_await;
        self.return_frames = vec![Vec::new()];

        let mut last = Type::Unknown;
        for statement in &program.statements {
            last = self.check_statement(statement)?;
        }
        Ok(last)
    }

    /// The program's return type: the union of all `return` statements
    /// reachable through program, `if` and `for` bodies (function
    /// bodies collect into their own frame).
    pub fn infer_return_type(&mut self, program: &Program) -> TypeResult<Type> {
        self.check(program)?;
        let returns = self.return_frames.pop().unwrap_or_default();
        self.return_frames.push(Vec::new());
        Ok(Type::union_of(returns))
    }

    fn check_statement(&mut self, statement: &Statement) -> TypeResult<Type> {
        match statement {
            Statement::TypeDecl { name, annotation } => {
                let mut ty = self.resolve_annotation(annotation);
                // a type alias of an object shape becomes a named type
                if let Type::Object {
                    name: object_name @ None,
                    ..
                } = &mut ty
                {
                    *object_name = Some(name.clone());
                }
                self.registry.insert(name.clone(), ty);
                Ok(Type::Unknown)
            }
            Statement::InterfaceDecl { name, fields } => {
                let resolved = fields
                    .iter()
                    .map(|(field, annotation)| {
                        (field.clone(), self.resolve_annotation(annotation))
                    })
                    .collect();
                let ty = Type::Object {
                    name: Some(name.clone()),
                    fields: resolved,
                };
                self.registry.insert(name.clone(), ty);
                Ok(Type::Unknown)
            }
            Statement::VarDecl {
                name,
                annotation,
                value,
                ..
            } => {
                let value_type = self.infer_expression(value)?;
                let bound = match annotation {
                    Some(annotation) => {
                        let declared = self.resolve_annotation(annotation);
                        if !Self::is_assignable(&value_type, &declared) {
                            return Err(TypeError::NotAssignable {
                                source: value_type.to_string(),
                                target: declared.to_string(),
                            });
                        }
                        declared
                    }
                    None => value_type,
                };
                self.scopes.declare(name, bound.clone());
                Ok(bound)
            }
            Statement::FuncDecl {
                name,
                params,
                return_annotation,
                body,
                is_async,
            } => {
                let param_types: Vec<Type> = params
                    .iter()
                    .map(|p| {
                        p.annotation
                            .as_ref()
                            .map(|a| self.resolve_annotation(a))
                            .unwrap_or(Type::Unknown)
                    })
                    .collect();

                self.scopes.push();
                for (param, ty) in params.iter().zip(&param_types) {
                    self.scopes.declare(&param.name, ty.clone());
                }
                let previous_async = self.in_async;
                self.in_async = *is_async;
                self.return_frames.push(Vec::new());

                let mut body_error = None;
                for statement in body {
                    if let Err(err) = self.check_statement(statement) {
                        body_error = Some(err);
                        break;
                    }
                }

                let returns = self.return_frames.pop().unwrap_or_default();
                self.in_async = previous_async;
                self.scopes.pop();
                if let Some(err) = body_error {
                    return Err(err);
                }

                let mut computed = Type::union_of(returns);
                if *is_async && !matches!(computed, Type::Promise(_)) {
                    computed = Type::promise(computed);
                }

                let final_return = match return_annotation {
                    Some(annotation) => {
                        let declared = self.resolve_annotation(annotation);
                        if !Self::is_assignable(&computed, &declared) {
                            return Err(TypeError::ReturnMismatch {
                                function: name.clone(),
                                actual: computed.to_string(),
                                declared: declared.to_string(),
                            });
                        }
                        declared
                    }
                    None => computed,
                };

                let fn_type = Type::Function {
                    params: param_types,
                    return_type: Box::new(final_return),
                    is_async: *is_async,
                };
                self.scopes.declare(name, fn_type.clone());
                Ok(fn_type)
            }
            Statement::Return(value) => {
                let ty = match value {
                    Some(expression) => self.infer_expression(expression)?,
                    None => Type::null(),
                };
                if let Some(frame) = self.return_frames.last_mut() {
                    frame.push(ty.clone());
                }
                Ok(ty)
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                self.infer_expression(condition)?;
                let mut result = Type::Unknown;
                for statement in then_body {
                    result = self.check_statement(statement)?;
                }
                if let Some(else_statements) = else_body {
                    for statement in else_statements {
                        result = self.check_statement(statement)?;
                    }
                }
                Ok(result)
            }
            Statement::For {
                variable,
                iterable,
                body,
                is_await,
            } => {
                let iterable_type = self.infer_expression(iterable)?;
                let element = if *is_await {
                    // one combined requirement: async context and a
                    // Promise<T[]> iterable
                    if !self.in_async {
                        return Err(TypeError::ForAwaitNotAsyncIterable);
                    }
                    match &iterable_type {
                        Type::Promise(inner) => match inner.as_ref() {
                            Type::Array(element) => (**element).clone(),
                            Type::Unknown => Type::Unknown,
                            _ => return Err(TypeError::ForAwaitNotAsyncIterable),
                        },
                        Type::Unknown => Type::Unknown,
                        _ => return Err(TypeError::ForAwaitNotAsyncIterable),
                    }
                } else {
                    match &iterable_type {
                        Type::Array(element) => (**element).clone(),
                        _ => Type::Unknown,
                    }
                };

                self.scopes.push();
                self.scopes.declare(variable, element);
                let mut result = Type::Unknown;
                let mut body_error = None;
                for statement in body {
                    match self.check_statement(statement) {
                        Ok(ty) => result = ty,
                        Err(err) => {
                            body_error = Some(err);
                            break;
                        }
                    }
                }
                self.scopes.pop();
                match body_error {
                    Some(err) => Err(err),
                    None => Ok(result),
                }
            }
            Statement::Expression(expression) => self.infer_expression(expression),
        }
    }

    pub fn infer_expression(&mut self, expression: &Expression) -> TypeResult<Type> {
        match expression {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Number(_) => Type::number(),
                Literal::String(_) => Type::string(),
                Literal::Bool(_) => Type::boolean(),
                Literal::Null => Type::null(),
            }),
            Expression::Identifier(name) => Ok(self.lookup_identifier(name)),
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left_type = self.infer_expression(left)?;
                let right_type = self.infer_expression(right)?;
                Ok(match operator {
                    BinaryOperator::Add => {
                        if left_type.equals(&Type::string()) || right_type.equals(&Type::string())
                        {
                            Type::string()
                        } else {
                            Type::number()
                        }
                    }
                    BinaryOperator::Subtract
                    | BinaryOperator::Multiply
                    | BinaryOperator::Divide
                    | BinaryOperator::Modulo => Type::number(),
                    _ => Type::boolean(),
                })
            }
            Expression::Unary { operator, operand } => {
                self.infer_expression(operand)?;
                Ok(match operator {
                    UnaryOperator::Not => Type::boolean(),
                    UnaryOperator::Negate => Type::number(),
                })
            }
            Expression::Await(argument) => {
                if !self.in_async {
                    return Err(TypeError::AwaitOutsideAsync);
                }
                let ty = self.infer_expression(argument)?;
                Ok(match ty {
                    Type::Promise(inner) => *inner,
                    other => other,
                })
            }
            Expression::Call { callee, args } => self.infer_call(callee, args),
            Expression::Member {
                object,
                property,
                computed,
            } => {
                let object_type = self.infer_expression(object)?;
                Ok(Self::member_type(&object_type, property, *computed))
            }
            Expression::Array(elements) => {
                if elements.is_empty() {
                    return Ok(Type::array(Type::Unknown));
                }
                let first = self.infer_expression(&elements[0])?;
                for element in &elements[1..] {
                    self.infer_expression(element)?;
                }
                Ok(Type::array(first))
            }
            Expression::Object { fields, .. } => {
                let mut field_types = Vec::new();
                for (key, value) in fields {
                    field_types.push((key.clone(), self.infer_expression(value)?));
                }
                Ok(Type::Object {
                    name: None,
                    fields: field_types,
                })
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.infer_expression(condition)?;
                let then_type = self.infer_expression(then_branch)?;
                let else_type = self.infer_expression(else_branch)?;
                if then_type.equals(&else_type) {
                    Ok(then_type)
                } else {
                    Ok(Type::union_of(vec![then_type, else_type]))
                }
            }
            Expression::Arrow {
                params,
                body,
                is_async,
            } => {
                self.scopes.push();
                // callback parameter types are not inferred
                for param in params {
                    self.scopes.declare(param, Type::Unknown);
                }
                let previous_async = self.in_async;
                self.in_async = *is_async;
                let body_type = self.infer_expression(body);
                self.in_async = previous_async;
                self.scopes.pop();

                let mut return_type = body_type?;
                if *is_async && !matches!(return_type, Type::Promise(_)) {
                    return_type = Type::promise(return_type);
                }
                Ok(Type::Function {
                    params: vec![Type::Unknown; params.len()],
                    return_type: Box::new(return_type),
                    is_async: *is_async,
                })
            }
            Expression::Assignment { target, value } => {
                let value_type = self.infer_expression(value)?;
                if let Expression::Identifier(name) = target.as_ref() {
                    self.scopes.assign(name, value_type.clone());
                }
                Ok(value_type)
            }
        }
    }

    fn infer_call(&mut self, callee: &Expression, args: &[Expression]) -> TypeResult<Type> {
        // arguments are always inferred so arrow bodies get checked
        for arg in args {
            self.infer_expression(arg)?;
        }

        if let Expression::Member {
            object,
            property,
            computed,
        } = callee
        {
            let object_type = self.infer_expression(object)?;
            if let Type::Array(element) = &object_type {
                if let Some(method) = Self::property_key(property, *computed) {
                    match method.as_str() {
                        // map keeps the element type: callback inference
                        // is not performed
                        "filter" | "map" | "slice" | "concat" => return Ok(object_type.clone()),
                        "find" | "at" => return Ok((**element).clone()),
                        "length" | "findIndex" | "indexOf" => return Ok(Type::number()),
                        "some" | "every" | "includes" => return Ok(Type::boolean()),
                        _ => {}
                    }
                }
            }
            let callee_type = Self::member_type(&object_type, property, *computed);
            return Ok(match callee_type {
                Type::Function { return_type, .. } => *return_type,
                _ => Type::Unknown,
            });
        }

        let callee_type = self.infer_expression(callee)?;
        Ok(match callee_type {
            Type::Function { return_type, .. } => *return_type,
            _ => Type::Unknown,
        })
    }

    fn lookup_identifier(&self, name: &str) -> Type {
        match self.scopes.lookup(name) {
            Some(ty) if !ty.is_unknown() => ty.clone(),
            _ => self.registry.get(name).cloned().unwrap_or(Type::Unknown),
        }
    }

    /// The property key named by a member access, when statically
    /// resolvable: the identifier for dot access, the stringified
    /// literal for bracket access.
    fn property_key(property: &Expression, computed: bool) -> Option<String> {
        match property {
            Expression::Identifier(name) if !computed => Some(name.clone()),
            Expression::Literal(literal) if computed => Some(literal.as_property_key()),
            _ => None,
        }
    }

    fn member_type(object_type: &Type, property: &Expression, computed: bool) -> Type {
        let key = Self::property_key(property, computed);
        match object_type {
            Type::Object { fields, .. } => match key {
                Some(key) => fields
                    .iter()
                    .find(|(field, _)| *field == key)
                    .map(|(_, ty)| ty.clone())
                    .unwrap_or(Type::Unknown),
                None => Type::Unknown,
            },
            Type::Array(element) => {
                if key.as_deref() == Some("length") {
                    Type::number()
                } else if computed
                    && matches!(property, Expression::Literal(Literal::Number(_)))
                {
                    (**element).clone()
                } else {
                    Type::Unknown
                }
            }
            _ => Type::Unknown,
        }
    }

    pub fn resolve_annotation(&self, annotation: &TypeAnnotation) -> Type {
        match annotation {
            TypeAnnotation::Primitive(p) => Type::Primitive(*p),
            TypeAnnotation::Array(inner) => Type::array(self.resolve_annotation(inner)),
            TypeAnnotation::Object(fields) => Type::Object {
                name: None,
                fields: fields
                    .iter()
                    .map(|(field, ann)| (field.clone(), self.resolve_annotation(ann)))
                    .collect(),
            },
            TypeAnnotation::Union(parts) => {
                Type::Union(parts.iter().map(|p| self.resolve_annotation(p)).collect())
            }
            TypeAnnotation::Reference(name) => {
                self.registry.get(name).cloned().unwrap_or(Type::Unknown)
            }
            TypeAnnotation::Promise(inner) => Type::promise(self.resolve_annotation(inner)),
        }
    }

    /// Directional structural compatibility: can a value of `source`
    /// be used where `target` is expected?
    pub fn is_assignable(source: &Type, target: &Type) -> bool {
        // a union source must fit the target through every member
        if let Type::Union(members) = source {
            return members.iter().all(|member| Self::is_assignable(member, target));
        }
        if source.equals(target) {
            return true;
        }
        if source.is_unknown() || target.is_unknown() {
            return true;
        }
        if let Type::Union(alternatives) = target {
            return alternatives
                .iter()
                .any(|alternative| Self::is_assignable(source, alternative));
        }
        match (source, target) {
            (Type::Array(s), Type::Array(t)) => Self::is_assignable(s, t),
            (Type::Promise(s), Type::Promise(t)) => Self::is_assignable(s, t),
            (
                Type::Object {
                    fields: source_fields,
                    ..
                },
                Type::Object {
                    fields: target_fields,
                    ..
                },
            ) => {
                // width subtyping: source may carry extra fields
                target_fields.iter().all(|(key, target_ty)| {
                    source_fields
                        .iter()
                        .find(|(field, _)| field == key)
                        .map_or(false, |(_, source_ty)| {
                            Self::is_assignable(source_ty, target_ty)
                        })
                })
            }
            _ => false,
        }
    }
}
