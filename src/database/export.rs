use std::collections::BTreeMap;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use sqlx::{Pool, Postgres};

use crate::{
    constants::{
        LINE_STEP_MM, MARGIN_BOTTOM_MM, MARGIN_LEFT_MM, PAGE_HEIGHT_MM, PAGE_WIDTH_MM, TITLE_Y_MM,
    },
    error::{ApiError, QueryError},
    schema::{CartIngredientRow, ShoppingListLine, Uuid},
};

/// Collects every ingredient row belonging to a recipe in the caller's
/// cart, aggregates it and renders the PDF. Fails if the cart is empty.
pub async fn build_shopping_list(user_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<u8>, ApiError> {
    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM user_shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    if rows.is_empty() {
        return Err(ApiError::EmptyCart);
    }

    let lines = group_lines(rows);
    log::debug!(
        "rendering shopping list for user {user_id}: {} line(s)",
        lines.len()
    );
    render_shopping_list(&lines)
}

/// Groups by `(ingredient name, measurement unit)`, sums the amounts
/// and orders alphabetically by name.
pub fn group_lines(rows: Vec<CartIngredientRow>) -> Vec<ShoppingListLine> {
    let mut groups: BTreeMap<(String, String), i64> = BTreeMap::new();
    for row in rows {
        *groups.entry((row.name, row.measurement_unit)).or_insert(0) += i64::from(row.amount);
    }

    groups
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListLine {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

/// Fixed-layout A4 document: title, section header, column header row,
/// then one line per group with a constant vertical decrement.
pub fn render_shopping_list(lines: &[ShoppingListLine]) -> Result<Vec<u8>, ApiError> {
    let (doc, page, layer) = PdfDocument::new(
        "Shopping list",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "shopping-list",
    );

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ApiError::Export(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ApiError::Export(e.to_string()))?;

    let mut current = doc.get_page(page).get_layer(layer);
    current.use_text("Shopping list", 20.0, Mm(MARGIN_LEFT_MM), Mm(TITLE_Y_MM), &bold);
    current.use_text(
        "Ingredients to buy",
        14.0,
        Mm(MARGIN_LEFT_MM),
        Mm(TITLE_Y_MM - 1.5 * LINE_STEP_MM),
        &bold,
    );

    let mut y = TITLE_Y_MM - 3.0 * LINE_STEP_MM;
    write_columns(&current, &bold, y, "Ingredient", "Amount", "Unit");

    for line in lines {
        y -= LINE_STEP_MM;
        if y < MARGIN_BOTTOM_MM {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "shopping-list");
            current = doc.get_page(page).get_layer(layer);
            y = TITLE_Y_MM;
        }
        write_columns(
            &current,
            &regular,
            y,
            &line.name,
            &line.amount.to_string(),
            &line.measurement_unit,
        );
    }

    doc.save_to_bytes()
        .map_err(|e| ApiError::Export(e.to_string()))
}

fn write_columns(
    layer: &printpdf::PdfLayerReference,
    font: &IndirectFontRef,
    y: f32,
    name: &str,
    amount: &str,
    unit: &str,
) {
    layer.use_text(name, 12.0, Mm(MARGIN_LEFT_MM), Mm(y), font);
    layer.use_text(amount, 12.0, Mm(120.0), Mm(y), font);
    layer.use_text(unit, 12.0, Mm(150.0), Mm(y), font);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> CartIngredientRow {
        CartIngredientRow {
            name: String::from(name),
            measurement_unit: String::from(unit),
            amount,
        }
    }

    #[test]
    fn sums_amounts_per_ingredient_and_unit() {
        let lines = group_lines(vec![
            row("Flour", "g", 100),
            row("Egg", "pcs", 2),
            row("Flour", "g", 250),
        ]);

        assert_eq!(
            lines,
            vec![
                ShoppingListLine {
                    name: String::from("Egg"),
                    measurement_unit: String::from("pcs"),
                    amount: 2,
                },
                ShoppingListLine {
                    name: String::from("Flour"),
                    measurement_unit: String::from("g"),
                    amount: 350,
                },
            ]
        );
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let lines = group_lines(vec![row("Milk", "ml", 200), row("Milk", "l", 1)]);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn renders_a_pdf_document() {
        let lines = group_lines(vec![row("Flour", "g", 350)]);
        let bytes = render_shopping_list(&lines).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_lists_spill_onto_extra_pages() {
        let rows = (0..60)
            .map(|i| row(&format!("Ingredient {i:02}"), "g", i + 1))
            .collect();
        let bytes = render_shopping_list(&group_lines(rows)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
