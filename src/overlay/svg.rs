use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::{OverlayElement, OverlayStyle};
use crate::layout::SurfaceSize;

pub fn render_svg(
    elements: &[OverlayElement],
    surface: SurfaceSize,
    style: &OverlayStyle,
    backdrop: Option<(&[u8], &str)>,
) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = surface.width,
        h = surface.height
    ));

    if let Some((bytes, mime)) = backdrop {
        let data_uri = format!("data:{};base64,{}", mime, BASE64.encode(bytes));
        svg.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = data_uri,
            w = surface.width,
            h = surface.height
        ));
    }

    for element in elements {
        match element.rotation {
            Some(angle) => svg.push_str(&format!(
                r#"<g transform="rotate({a} {x} {y})">"#,
                a = angle,
                x = element.x,
                y = element.y
            )),
            None => svg.push_str("<g>"),
        }
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
            x = element.x,
            y = element.y,
            w = element.width,
            h = element.height,
            fill = escape_xml(&style.background_color)
        ));

        // Baseline sits so the em box is vertically centred in the element.
        let baseline = element.y + (element.height - element.font_size) / 2.0 + element.font_size * 0.8;
        let family = style
            .font_family
            .as_deref()
            .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
            .unwrap_or_default();
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}"{family} xml:space="preserve">{text}</text>"#,
            x = element.x,
            y = baseline,
            size = element.font_size,
            color = escape_xml(&style.text_color),
            family = family,
            text = escape_xml(&element.text)
        ));
        svg.push_str("</g>");
    }

    svg.push_str("</svg>");
    svg
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(rotation: Option<f64>) -> OverlayElement {
        OverlayElement {
            text: "a < b & \"c\"".to_string(),
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 16.0,
            font_size: 16.0,
            rotation,
            confidence: 1.0,
        }
    }

    #[test]
    fn transparent_surface_without_backdrop() {
        let svg = render_svg(
            &[element(None)],
            SurfaceSize::new(400.0, 300.0),
            &OverlayStyle::default(),
            None,
        );
        assert!(svg.starts_with("<svg "));
        assert!(svg.contains(r#"width="400" height="300""#));
        assert!(!svg.contains("<image"));
        assert!(!svg.contains("rotate("));
        assert!(svg.contains("a &lt; b &amp; &quot;c&quot;"));
    }

    #[test]
    fn rotation_pivots_on_top_left() {
        let svg = render_svg(
            &[element(Some(-12.5))],
            SurfaceSize::new(400.0, 300.0),
            &OverlayStyle::default(),
            None,
        );
        assert!(svg.contains(r#"<g transform="rotate(-12.5 10 20)">"#));
    }

    #[test]
    fn backdrop_is_embedded_as_data_uri() {
        let svg = render_svg(
            &[],
            SurfaceSize::new(4.0, 3.0),
            &OverlayStyle {
                font_family: Some("Noto Sans".to_string()),
                ..OverlayStyle::default()
            },
            Some((b"png", "image/png")),
        );
        assert!(svg.contains("data:image/png;base64,cG5n"));
    }
}
