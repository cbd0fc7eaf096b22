//! `%s` templates shipped in the kernel tree (`linux.S.in`).

use anyhow::{bail, Result};

/// Substitute the single `%s` in `template` with `value`.
///
/// `%%` yields a literal `%`. Any other `%` conversion, or a placeholder
/// count other than one, is an error.
pub fn render(template: &str, value: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len() + value.len());
    let mut placeholders = 0usize;
    let mut chars = template.char_indices();

    while let Some((offset, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, 's')) => {
                out.push_str(value);
                placeholders += 1;
            }
            Some((_, '%')) => out.push('%'),
            Some((_, other)) => bail!("unsupported conversion '%{}' at byte {}", other, offset),
            None => bail!("incomplete conversion '%' at end of template"),
        }
    }

    if placeholders != 1 {
        bail!("expected exactly one '%s' placeholder, found {}", placeholders);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUB: &str = "\t.section .kernel\n\t.incbin \"%s\"\n";

    #[test]
    fn test_render_substitutes_image_path() {
        let rendered = render(STUB, "../../build/cont0/linux/arch/arm/boot/Image").unwrap();
        assert_eq!(
            rendered,
            "\t.section .kernel\n\t.incbin \"../../build/cont0/linux/arch/arm/boot/Image\"\n"
        );
    }

    #[test]
    fn test_render_escaped_percent() {
        assert_eq!(render("100%% %s", "x").unwrap(), "100% x");
    }

    #[test]
    fn test_render_rejects_bad_placeholders() {
        assert!(render("no placeholder\n", "x").is_err());
        assert!(render("%s %s", "x").is_err());
        assert!(render("%d", "x").is_err());
        assert!(render("%s trailing %", "x").is_err());
    }
}
