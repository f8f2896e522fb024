//! Arithmetic demonstration tool.

use serde_json::{Map, Value};

use super::tools::{ParameterDescriptor, ParameterType, Tool, ToolCallResult, ToolDescriptor};

/// Operations accepted by [`CalculatorTool`].
const OPERATIONS: [&str; 4] = ["add", "subtract", "multiply", "divide"];

/// Performs basic arithmetic on two numbers.
#[derive(Debug, Clone)]
pub struct CalculatorTool {
    descriptor: ToolDescriptor,
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculatorTool {
    /// Creates the tool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "calculator",
                "Perform basic arithmetic: add, subtract, multiply or divide two numbers.",
            )
            .parameter(
                ParameterDescriptor::new("operation", ParameterType::String, "Operation to perform")
                    .one_of(OPERATIONS),
            )
            .parameter(ParameterDescriptor::new("a", ParameterType::Number, "First operand"))
            .parameter(ParameterDescriptor::new("b", ParameterType::Number, "Second operand")),
        }
    }
}

impl Tool for CalculatorTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    #[allow(clippy::float_cmp)]
    fn call(&mut self, arguments: &Map<String, Value>) -> ToolCallResult {
        let operation = arguments
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let (Some(a), Some(b)) = (
            arguments.get("a").and_then(Value::as_f64),
            arguments.get("b").and_then(Value::as_f64),
        ) else {
            return ToolCallResult::error("Operands must be numbers");
        };

        let result = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" if b == 0.0 => return ToolCallResult::error("Division by zero"),
            "divide" => a / b,
            other => return ToolCallResult::error(format!("Unknown operation: {other}")),
        };

        if !result.is_finite() {
            return ToolCallResult::error("Result is not a finite number");
        }
        ToolCallResult::text(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(arguments: Value) -> ToolCallResult {
        let Value::Object(arguments) = arguments else {
            panic!("arguments must be an object");
        };
        CalculatorTool::new().call(&arguments)
    }

    #[test]
    fn performs_each_operation() {
        assert_eq!(run(json!({"operation": "add", "a": 2, "b": 3})), ToolCallResult::text("5"));
        assert_eq!(
            run(json!({"operation": "subtract", "a": 2, "b": 3})),
            ToolCallResult::text("-1")
        );
        assert_eq!(
            run(json!({"operation": "multiply", "a": 1.5, "b": 4})),
            ToolCallResult::text("6")
        );
        assert_eq!(
            run(json!({"operation": "divide", "a": 1, "b": 4})),
            ToolCallResult::text("0.25")
        );
    }

    #[test]
    fn division_by_zero_is_tool_error() {
        let result = run(json!({"operation": "divide", "a": 1, "b": 0}));
        assert!(result.is_error);
        assert_eq!(result, ToolCallResult::error("Division by zero"));
    }

    #[test]
    fn descriptor_restricts_operation() {
        let tool = CalculatorTool::new();
        let schema = tool.descriptor().input_schema();
        assert_eq!(schema["required"], json!(["operation", "a", "b"]));
        assert_eq!(schema["properties"]["operation"]["enum"].as_array().map(Vec::len), Some(4));

        let Value::Object(arguments) = json!({"operation": "modulo", "a": 1, "b": 2}) else {
            unreachable!();
        };
        assert!(tool.descriptor().validate(&arguments).is_err());
    }
}
