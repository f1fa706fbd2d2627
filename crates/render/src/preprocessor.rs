//! WGSL preprocessing: every shader is compiled with the global uniforms
//! prelude prepended, so compiler line numbers must be shifted back.

use crate::device::CompilationMessage;

/// Declarations shared by every engine shader.
pub const PRELUDE: &str = r#"
struct GlobalUniforms
{
    projectionMatrix: mat4x4<f32>,
    viewMatrix: mat4x4<f32>,
    cameraPosition: vec4f,
    time: f32,
    windowWidth: f32,
    windowHeight: f32
};
"#;

pub fn prelude_line_count() -> u32 {
    PRELUDE.bytes().filter(|b| *b == b'\n').count() as u32
}

/// Source as submitted to the compiler.
pub fn process(source: &str) -> String {
    let mut out = String::with_capacity(PRELUDE.len() + source.len());
    out.push_str(PRELUDE);
    out.push_str(source);
    out
}

/// Map a line of the processed source back to the user's source. Lines
/// inside the prelude resolve to 0.
pub fn resolve_line(line: u32) -> u32 {
    line.saturating_sub(prelude_line_count())
}

pub fn resolve_messages(messages: Vec<CompilationMessage>) -> Vec<CompilationMessage> {
    messages
        .into_iter()
        .map(|m| CompilationMessage {
            line: resolve_line(m.line),
            ..m
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_is_prepended() {
        let out = process("fn main() {}");
        assert!(out.starts_with("\nstruct GlobalUniforms"));
        assert!(out.ends_with("fn main() {}"));
    }

    #[test]
    fn first_user_line_resolves_to_one() {
        let processed = process("line one\nline two");
        let line_of_user_start = processed
            .lines()
            .position(|l| l == "line one")
            .unwrap() as u32
            + 1;
        assert_eq!(resolve_line(line_of_user_start), 1);
        assert_eq!(resolve_line(line_of_user_start + 1), 2);
    }

    #[test]
    fn prelude_lines_clamp_to_zero() {
        assert_eq!(resolve_line(2), 0);
        let resolved = resolve_messages(vec![CompilationMessage {
            message: "bad".into(),
            line: prelude_line_count() + 4,
            column: 7,
        }]);
        assert_eq!(resolved[0].line, 4);
        assert_eq!(resolved[0].column, 7);
    }
}
