use std::fmt;

// Lexer errors
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    UnterminatedString {
        line: usize,
    },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexError::UnexpectedCharacter {
                character,
                line,
                column,
            } => {
                write!(
                    f,
                    "Unexpected character '{}' at line {}, column {}",
                    character, line, column
                )
            }
            LexError::UnterminatedString { line } => {
                write!(f, "Unterminated string at line {}", line)
            }
        }
    }
}

impl std::error::Error for LexError {}

// Parser errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Expected {
        expected: String,
        found: String,
        line: usize,
    },
    UnexpectedToken {
        token: String,
        line: usize,
    },
    ComplexComputedMember,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Expected {
                expected,
                found,
                line,
            } => {
                write!(f, "Expected {}, got {} at line {}", expected, found, line)
            }
            ParseError::UnexpectedToken { token, line } => {
                write!(f, "Unexpected token {} at line {}", token, line)
            }
            ParseError::ComplexComputedMember => {
                write!(f, "Complex computed member access not yet supported")
            }
        }
    }
}

impl std::error::Error for ParseError {}

// Type errors
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    NotAssignable {
        source: String,
        target: String,
    },
    ReturnMismatch {
        function: String,
        actual: String,
        declared: String,
    },
    AwaitOutsideAsync,
    ForAwaitNotAsyncIterable,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeError::NotAssignable { source, target } => {
                write!(f, "Cannot assign {} to {}", source, target)
            }
            TypeError::ReturnMismatch {
                function,
                actual,
                declared,
            } => {
                write!(
                    f,
                    "Function {} returns {} but declared {}",
                    function, actual, declared
                )
            }
            TypeError::AwaitOutsideAsync => {
                write!(f, "await can only be used in async functions")
            }
            TypeError::ForAwaitNotAsyncIterable => {
                write!(f, "for await…of requires an async iterable (Promise<T[]>)")
            }
        }
    }
}

impl std::error::Error for TypeError {}

// Compilation errors: everything a compile call can abort with
#[derive(Debug)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Type(TypeError),
    Io(std::io::Error),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "{}", e),
            CompileError::Parse(e) => write!(f, "{}", e),
            CompileError::Type(e) => write!(f, "{}", e),
            CompileError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

impl From<TypeError> for CompileError {
    fn from(err: TypeError) -> Self {
        CompileError::Type(err)
    }
}

impl From<std::io::Error> for CompileError {
    fn from(err: std::io::Error) -> Self {
        CompileError::Io(err)
    }
}

// Result types
pub type LexResult<T> = Result<T, LexError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type TypeResult<T> = Result<T, TypeError>;
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_messages() {
        let err = LexError::UnexpectedCharacter {
            character: '@',
            line: 3,
            column: 7,
        };
        assert_eq!(
            err.to_string(),
            "Unexpected character '@' at line 3, column 7"
        );

        let err = LexError::UnterminatedString { line: 2 };
        assert_eq!(err.to_string(), "Unterminated string at line 2");
    }

    #[test]
    fn test_parse_error_messages() {
        let err = ParseError::Expected {
            expected: "')' after arguments".to_string(),
            found: "'}'".to_string(),
            line: 4,
        };
        assert_eq!(
            err.to_string(),
            "Expected ')' after arguments, got '}' at line 4"
        );
    }

    #[test]
    fn test_type_error_messages() {
        let err = TypeError::NotAssignable {
            source: "string".to_string(),
            target: "number".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot assign string to number");

        let err = TypeError::ReturnMismatch {
            function: "getSpells".to_string(),
            actual: "number".to_string(),
            declared: "Spell[]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Function getSpells returns number but declared Spell[]"
        );
    }

    #[test]
    fn test_compile_error_passes_message_through() {
        let err: CompileError = TypeError::AwaitOutsideAsync.into();
        assert_eq!(err.to_string(), "await can only be used in async functions");
    }
}
