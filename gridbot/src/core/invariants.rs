//! Structural checks the type system cannot express.

use std::collections::HashSet;

use crate::core::level::Level;
use crate::core::program::{Instruction, Program};
use crate::stack::ensure_sufficient_stack;

/// Check program invariants:
/// - Every entry of `functions` is a `FunctionDef` with a non-empty name
/// - No duplicate function names
/// - No `FunctionDef` nested inside any body
pub fn validate_program(program: &Program) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, entry) in program.functions.iter().enumerate() {
        let path = format!("functions[{index}]");
        match entry {
            Instruction::FunctionDef {
                function_name,
                body,
            } => {
                if function_name.trim().is_empty() {
                    errors.push(format!("{path}: function name must not be empty"));
                }
                if !seen.insert(function_name.as_str()) {
                    errors.push(format!(
                        "{path}: duplicate function '{function_name}' replaces an earlier definition"
                    ));
                }
                validate_body(body, &format!("{path}/{function_name}"), &mut errors);
            }
            other => errors.push(format!(
                "{path}: expected a function definition, found '{}'",
                other.kind()
            )),
        }
    }

    validate_body(&program.main, "main", &mut errors);
    errors
}

fn validate_body(body: &[Instruction], path: &str, errors: &mut Vec<String>) {
    for (index, node) in body.iter().enumerate() {
        let node_path = format!("{path}[{index}]");
        if let Instruction::FunctionDef { function_name, .. } = node {
            errors.push(format!(
                "{node_path}: function '{function_name}' must be defined at top level"
            ));
        }
        for child in node.bodies() {
            ensure_sufficient_stack(|| {
                validate_body(child, &format!("{node_path}/{}", node.kind()), errors)
            });
        }
    }
}

/// Check level invariants not expressible in JSON Schema:
/// - `grid_size > 0`
/// - Player start and goal lie inside the grid
/// - Player does not start on an obstacle
pub fn validate_level(level: &Level) -> Vec<String> {
    let mut errors = Vec::new();
    let label = format!("level {}", level.id);
    if level.grid_size <= 0 {
        errors.push(format!("{label}: gridSize must be > 0"));
        return errors;
    }

    let inside =
        |x: i64, y: i64| (0..level.grid_size).contains(&x) && (0..level.grid_size).contains(&y);
    if !inside(level.player.x, level.player.y) {
        errors.push(format!("{label}: player start is outside the grid"));
    }
    if !inside(level.goal.x, level.goal.y) {
        errors.push(format!("{label}: goal is outside the grid"));
    }
    if level.obstacles.contains(&level.player.position()) {
        errors.push(format!("{label}: player starts on an obstacle"));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Position;

    #[test]
    fn accepts_well_formed_program() {
        let program = Program::new(vec![
            Instruction::Call {
                function_name: "walk".to_string(),
            },
            Instruction::Repeat {
                count: 2,
                body: vec![Instruction::Move],
            },
        ])
        .with_function("walk", vec![Instruction::Move]);
        assert!(validate_program(&program).is_empty());
    }

    #[test]
    fn reports_nested_definitions_with_path() {
        let program = Program::new(vec![Instruction::Repeat {
            count: 1,
            body: vec![Instruction::FunctionDef {
                function_name: "inner".to_string(),
                body: Vec::new(),
            }],
        }]);
        let errors = validate_program(&program);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("main[0]/repeat[0]"));
        assert!(errors[0].contains("top level"));
    }

    #[test]
    fn reports_duplicates_and_stray_entries() {
        let mut program = Program::default()
            .with_function("a", Vec::new())
            .with_function("a", Vec::new());
        program.functions.push(Instruction::Move);
        let errors = validate_program(&program);
        assert!(errors.iter().any(|err| err.contains("duplicate function 'a'")));
        assert!(errors.iter().any(|err| err.contains("found 'move'")));
    }

    #[test]
    fn level_checks_bounds_and_start_cell() {
        assert!(validate_level(&Level::awakening()).is_empty());

        let mut level = Level::awakening();
        level.goal = Position::new(10, 3);
        level.obstacles.push(Position::new(1, 1));
        let errors = validate_level(&level);
        assert!(errors.iter().any(|err| err.contains("goal is outside")));
        assert!(errors.iter().any(|err| err.contains("starts on an obstacle")));
    }
}
