use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tiny_skia::{Pixmap, Transform};
use usvg::{Options, Tree, fontdb};

use super::OverlayFont;

// Text must rasterize with the face it was fitted with.
pub fn render_png(svg: &str, font: Option<&OverlayFont>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    match font {
        Some(font) => {
            db.load_font_data(font.data().to_vec());
            db.set_sans_serif_family(font.family());
        }
        None => db.load_system_fonts(),
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };

    let tree = Tree::from_str(svg, &options).context("invalid overlay SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow!("overlay has no area"))?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
    pixmap
        .encode_png()
        .map_err(|err| anyhow!("failed to encode overlay PNG: {}", err))
}
