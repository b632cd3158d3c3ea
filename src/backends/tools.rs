use serde::Deserialize;
use serde_json::{json, Value};

pub const MATH_TOOL_NAME: &str = "perform_math_operation";

/// The fixed math tool offered to Cerebras when tool use is on
pub fn math_tool_schema() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": MATH_TOOL_NAME,
            "description": "Perform a basic math operation",
            "parameters": {
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["add", "subtract", "multiply", "divide"],
                        "description": "The math operation to perform",
                    },
                    "x": {
                        "type": "number",
                        "description": "The first number",
                    },
                    "y": {
                        "type": "number",
                        "description": "The second number",
                    },
                },
                "required": ["operation", "x", "y"],
            },
        }
    })
}

#[derive(Debug, Deserialize)]
struct MathArguments {
    operation: String,
    x: f64,
    y: f64,
}

/// Evaluate the math tool. Failures are reported as text, never as errors.
pub fn perform_math_operation(operation: &str, x: f64, y: f64) -> String {
    let result = match operation {
        "add" => x + y,
        "subtract" => x - y,
        "multiply" => x * y,
        "divide" => {
            if y == 0.0 {
                return "Error: Division by zero".to_string();
            }
            x / y
        }
        other => return format!("Error: Unknown operation '{}'", other),
    };
    result.to_string()
}

/// Resolve one tool call from its name and JSON-encoded arguments
pub fn dispatch_tool_call(name: &str, arguments: &str) -> String {
    if name != MATH_TOOL_NAME {
        return format!("Error: Unknown tool '{}'", name);
    }
    match serde_json::from_str::<MathArguments>(arguments) {
        Ok(args) => perform_math_operation(&args.operation, args.x, args.y),
        Err(e) => format!("Error: invalid arguments: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_operations() {
        assert_eq!(perform_math_operation("add", 5.0, 3.0), "8");
        assert_eq!(perform_math_operation("subtract", 2.0, 3.5), "-1.5");
        assert_eq!(perform_math_operation("multiply", 4.0, 2.5), "10");
        assert_eq!(perform_math_operation("divide", 9.0, 2.0), "4.5");
    }

    #[test]
    fn test_division_by_zero_is_text() {
        assert_eq!(perform_math_operation("divide", 1.0, 0.0), "Error: Division by zero");
    }

    #[test]
    fn test_unknown_operation() {
        assert_eq!(
            perform_math_operation("pow", 2.0, 3.0),
            "Error: Unknown operation 'pow'"
        );
    }

    #[test]
    fn test_dispatch() {
        assert_eq!(
            dispatch_tool_call(MATH_TOOL_NAME, r#"{"operation":"add","x":1,"y":2}"#),
            "3"
        );
        assert!(dispatch_tool_call(MATH_TOOL_NAME, r#"{"operation":"add"}"#)
            .starts_with("Error: invalid arguments"));
        assert_eq!(dispatch_tool_call("weather", "{}"), "Error: Unknown tool 'weather'");
    }

    #[test]
    fn test_schema_shape() {
        let schema = math_tool_schema();
        assert_eq!(schema["function"]["name"], MATH_TOOL_NAME);
        assert_eq!(
            schema["function"]["parameters"]["required"],
            json!(["operation", "x", "y"])
        );
    }
}
