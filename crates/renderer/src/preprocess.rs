//! GLSL source assembly: version banner, `#define` injection and textual
//! `#include` resolution.
//!
//! The scan is deliberately line-oriented rather than a real lexer: a
//! directive is recognized only when a line starts with the literal prefix
//! `#include ` and carries a double-quoted filename. Anything else is left
//! untouched for the GLSL compiler to judge. `#line` directives are emitted
//! around spliced content (and honored when already present) so driver
//! diagnostics keep pointing at the original files.

use tracing::warn;

use crate::assets::AssetSource;

/// Prefixed to every shader before any user source.
pub const GLSL_VERSION: &str = "#version 330 core\n";

/// Upper bound on assembled source fragments: the version banner, one per
/// define, one per spliced include and the trailing user source. Exceeding
/// it is a configuration bug, not a runtime condition.
pub const MAX_SOURCE_FRAGMENTS: usize = 64;

/// A `#define NAME VALUE` pair injected right after the version banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Define<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> Define<'a> {
    pub fn new(name: &'a str, value: &'a str) -> Self {
        Self { name, value }
    }
}

struct IncludeDirective {
    /// Byte offset of the directive line's first character.
    start: usize,
    /// Byte offset one past the directive line (past its newline).
    end: usize,
    name: String,
    /// Line number the source resumes at after the spliced content.
    restore_line: u32,
}

// Finds the first well-formed `#include "name"` line. Lines starting with
// `#line` update the line bookkeeping used for the restore directive.
fn find_include(src: &str) -> Option<IncludeDirective> {
    let mut offset = 0;
    let mut line_no: u32 = 0;

    for line in src.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        line_no += 1;

        if let Some(rest) = line.strip_prefix("#line ") {
            let digits: &str = rest
                .trim_start()
                .split(|c: char| !c.is_ascii_digit())
                .next()
                .unwrap_or("");
            match digits.parse::<u32>() {
                Ok(n) if n > 0 => line_no = n - 1,
                _ => warn!("failed to parse #line directive"),
            }
        } else if line.strip_prefix("#include ").is_some() {
            // First quote anywhere on the line, second quote after it; a
            // line that does not complete the pattern is not a directive.
            let Some(quote1) = line.find('"') else { continue };
            let after = &line[quote1 + 1..];
            let Some(name_len) = after.find('"') else { continue };
            if name_len == 0 {
                continue;
            }

            return Some(IncludeDirective {
                start,
                end: offset,
                name: after[..name_len].to_string(),
                restore_line: line_no + 1,
            });
        }
    }

    None
}

// Splices include files in place of their directive lines until none are
// left. Rescanning from the top after each splice resolves nested includes
// to arbitrary depth, bounded by the fragment budget.
fn resolve_includes(
    mut src: String,
    assets: &dyn AssetSource,
    include_dir: &str,
    fragments: &mut usize,
) -> String {
    let mut included: Vec<String> = Vec::new();

    while let Some(directive) = find_include(&src) {
        if included.contains(&directive.name) {
            warn!(
                "include \"{}\" requested again (cycle?); skipping",
                directive.name
            );
            src.replace_range(directive.start..directive.end, "");
            continue;
        }

        let path = format!("{include_dir}/{}", directive.name);
        let content = match assets.read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!("failed to read included file {}: {err}", directive.name);
                src.replace_range(directive.start..directive.end, "");
                continue;
            }
        };

        *fragments += 1;
        assert!(
            *fragments <= MAX_SOURCE_FRAGMENTS,
            "shader fragment budget exceeded ({} > {MAX_SOURCE_FRAGMENTS}) while including \"{}\"",
            *fragments,
            directive.name
        );
        included.push(directive.name.clone());

        let newline = if content.ends_with('\n') { "" } else { "\n" };
        let splice = format!(
            "#line 1\n{content}{newline}#line {}\n",
            directive.restore_line
        );
        src.replace_range(directive.start..directive.end, &splice);
    }

    src
}

/// Produces a complete compilable source: version banner, `#define` lines in
/// the given order, a `#line 1` marker and the user source with all
/// `#include` directives resolved against `include_dir`.
pub fn preprocess(
    source: &str,
    assets: &dyn AssetSource,
    include_dir: &str,
    defines: &[Define<'_>],
) -> String {
    let mut fragments = 2 + defines.len();
    assert!(
        fragments <= MAX_SOURCE_FRAGMENTS,
        "shader fragment budget exceeded by {} defines",
        defines.len()
    );

    let mut out = String::with_capacity(GLSL_VERSION.len() + source.len() + 64);
    out.push_str(GLSL_VERSION);
    for define in defines {
        out.push_str("#define ");
        out.push_str(define.name);
        out.push(' ');
        out.push_str(define.value);
        out.push('\n');
    }
    out.push_str("#line 1\n");
    out.push_str(source);

    resolve_includes(out, assets, include_dir, &mut fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;

    fn no_files() -> MemorySource {
        MemorySource::new()
    }

    #[test]
    fn plain_source_passes_through() {
        let src = "void main() {}\n";
        let out = preprocess(src, &no_files(), "shaders", &[]);
        assert_eq!(out, format!("{GLSL_VERSION}#line 1\n{src}"));
    }

    #[test]
    fn defines_appear_in_order_after_banner() {
        let out = preprocess(
            "void main() {}\n",
            &no_files(),
            "shaders",
            &[Define::new("A", "1"), Define::new("B", "2")],
        );

        let banner = out.find(GLSL_VERSION.trim_end()).unwrap();
        let a = out.find("#define A 1\n").unwrap();
        let b = out.find("#define B 2\n").unwrap();
        let body = out.find("void main()").unwrap();
        assert!(banner < a && a < b && b < body);
    }

    #[test]
    fn include_replaces_directive_line_in_place() {
        let mut assets = MemorySource::new();
        assets.insert("shaders/a.glsl", "float lifted();\n");

        let src = "vec3 up;\n#include \"a.glsl\"\nvoid main() {}\n";
        let out = preprocess(src, &assets, "shaders", &[]);

        assert!(!out.contains("#include"));
        // The splice starts exactly where the directive line began.
        let head = format!("{GLSL_VERSION}#line 1\nvec3 up;\n");
        let expected = format!("{head}#line 1\nfloat lifted();\n#line 3\nvoid main() {{}}\n");
        assert_eq!(out, expected);
    }

    #[test]
    fn nested_includes_resolve_transitively() {
        let mut assets = MemorySource::new();
        assets.insert("shaders/a.glsl", "#include \"b.glsl\"\nfloat a();\n");
        assets.insert("shaders/b.glsl", "#include \"c.glsl\"\nfloat b();\n");
        assets.insert("shaders/c.glsl", "float c();\n");

        let out = preprocess("#include \"a.glsl\"\n", &assets, "shaders", &[]);
        assert!(!out.contains("#include"));
        let ca = out.find("float c();").unwrap();
        let cb = out.find("float b();").unwrap();
        let cc = out.find("float a();").unwrap();
        assert!(ca < cb && cb < cc);
    }

    #[test]
    fn missing_include_drops_directive_and_keeps_rest() {
        let src = "float before;\n#include \"nope.glsl\"\nfloat after;\n";
        let out = preprocess(src, &no_files(), "shaders", &[]);

        assert!(!out.contains("#include"));
        assert!(out.contains("float before;\n"));
        assert!(out.contains("float after;\n"));
    }

    #[test]
    fn malformed_directives_are_left_untouched() {
        let src = "#include \"unterminated\n#include noquotes\n#include \"\"\n";
        let out = preprocess(src, &no_files(), "shaders", &[]);

        // All three fail the exact line pattern and stay in the source for
        // the GLSL compiler to reject.
        assert!(out.contains("#include \"unterminated\n"));
        assert!(out.contains("#include noquotes\n"));
        assert!(out.contains("#include \"\"\n"));
    }

    #[test]
    fn repeated_include_is_spliced_once() {
        let mut assets = MemorySource::new();
        assets.insert("shaders/a.glsl", "float once();\n");

        let src = "#include \"a.glsl\"\n#include \"a.glsl\"\n";
        let out = preprocess(src, &assets, "shaders", &[]);
        assert_eq!(out.matches("float once();").count(), 1);
    }

    #[test]
    fn self_include_terminates() {
        let mut assets = MemorySource::new();
        assets.insert("shaders/loop.glsl", "#include \"loop.glsl\"\nfloat x;\n");

        let out = preprocess("#include \"loop.glsl\"\n", &assets, "shaders", &[]);
        assert_eq!(out.matches("float x;").count(), 1);
    }

    #[test]
    #[should_panic(expected = "fragment budget")]
    fn include_chain_past_budget_is_fatal() {
        let mut assets = MemorySource::new();
        for i in 0..=MAX_SOURCE_FRAGMENTS {
            assets.insert(
                format!("shaders/{i}.glsl"),
                format!("#include \"{}.glsl\"\n", i + 1),
            );
        }

        preprocess("#include \"0.glsl\"\n", &assets, "shaders", &[]);
    }

    #[test]
    fn line_numbers_resume_after_existing_line_directive() {
        let mut assets = MemorySource::new();
        assets.insert("shaders/a.glsl", "float a();\n");

        // The #line 40 directive makes the next line number 40, so the
        // include on that line restores to 41.
        let src = "#line 40\n#include \"a.glsl\"\nfloat tail;\n";
        let out = preprocess(src, &assets, "shaders", &[]);
        assert!(out.contains("#line 41\nfloat tail;\n"));
    }
}
