use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Pt};

use crate::database::error::ApiError;
use crate::database::schema::ShoppingListRow;

/// Lines that fit between the first line offset (680pt) and the bottom
/// margin (20pt) at a 20pt pitch, on a US-letter page.
const ROWS_PER_PAGE: usize = 34;

fn page_width() -> Mm {
    // US letter, 612 x 792 pt, coordinates from the bottom-left corner.
    Mm::from(Pt(612.0))
}

fn page_height() -> Mm {
    Mm::from(Pt(792.0))
}

fn format_row(row: &ShoppingListRow) -> String {
    format!(
        "{}: {} {}.",
        row.name, row.total_amount, row.measurement_unit
    )
}

/// Renders the aggregated shopping list as a PDF. The first page carries a
/// header line; rows advance downward by a fixed pitch and overflow onto
/// fresh pages instead of running off the bottom. Zero rows produce a
/// one-page document with the header only.
pub fn render_shopping_list(rows: &[ShoppingListRow]) -> Result<Vec<u8>, ApiError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new("Shopping list", page_width(), page_height(), "text");
    let font = doc
        .add_builtin_font(BuiltinFont::TimesRoman)
        .map_err(|e| ApiError::Render(e.to_string()))?;

    let layer = doc.get_page(first_page).get_layer(first_layer);
    layer.use_text(
        "Shopping list:",
        18.0,
        Mm::from(Pt(30.0)),
        Mm::from(Pt(700.0)),
        &font,
    );

    let mut chunks = rows.chunks(ROWS_PER_PAGE);
    if let Some(chunk) = chunks.next() {
        write_rows(&layer, chunk, &font);
    }
    for chunk in chunks {
        let (page, layer_index) = doc.add_page(page_width(), page_height(), "text");
        let layer = doc.get_page(page).get_layer(layer_index);
        write_rows(&layer, chunk, &font);
    }

    doc.save_to_bytes()
        .map_err(|e| ApiError::Render(e.to_string()))
}

fn write_rows(layer: &PdfLayerReference, chunk: &[ShoppingListRow], font: &IndirectFontRef) {
    let mut y = Pt(680.0);
    for row in chunk {
        layer.use_text(format_row(row), 18.0, Mm::from(Pt(30.0)), Mm::from(y), font);
        y.0 -= 20.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, total: i64) -> ShoppingListRow {
        ShoppingListRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            total_amount: total,
        }
    }

    #[test]
    fn row_format_matches_contract() {
        assert_eq!(format_row(&row("flour", "g", 300)), "flour: 300 g.");
    }

    #[test]
    fn page_capacity_matches_line_geometry() {
        // 680pt first line, 20pt bottom margin, 20pt pitch.
        let fits = ((680.0_f64 - 20.0) / 20.0) as usize + 1;
        assert_eq!(ROWS_PER_PAGE, fits);
    }

    #[test]
    fn empty_aggregate_renders_header_only_document() {
        let bytes = render_shopping_list(&[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_list_renders() {
        let rows: Vec<ShoppingListRow> = (0..100)
            .map(|i| row(&format!("ingredient-{i:03}"), "g", i))
            .collect();
        let many = render_shopping_list(&rows).unwrap();
        let few = render_shopping_list(&rows[..1]).unwrap();
        assert!(many.starts_with(b"%PDF"));
        // three pages of content against one
        assert!(many.len() > few.len());
    }
}
