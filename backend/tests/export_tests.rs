//! Export and dashboard state tests
//!
//! Tests for the spreadsheet layout and view state including:
//! - Property 6: Export Column Order
//! - Empty exports are refused
//! - Stale fetches never replace newer data

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use shared::{
    aggregate_totals, build_export, filter, normalize, Cell, Category, DashboardState,
    ExportContext, ExportError, PackagingSize, ProductStockRow, RawStockRow, ShopSelection,
    StockKey, StockSnapshot,
};

fn category(size_ids: &[i64]) -> Category {
    Category {
        id: "3".to_string(),
        name: "Beer".to_string(),
        sizes: size_ids
            .iter()
            .map(|&id| PackagingSize {
                id,
                label: format!("S{}", id),
                title: format!("Title {}", id),
                category_id: 3,
            })
            .collect(),
    }
}

fn context() -> ExportContext<'static> {
    ExportContext {
        shop_label: "ALL SHOPS",
        category_label: "Beer",
        date_label: "2026-10-19",
        generated_at: "19/10/2026, 21:05:00",
    }
}

fn rows_for(category: &Category, names: &[&str]) -> Vec<ProductStockRow> {
    let raw_rows: Vec<RawStockRow> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut object = serde_json::Map::new();
            object.insert("product_id".to_string(), serde_json::json!(i));
            object.insert("product_name".to_string(), serde_json::json!(name));
            for size in &category.sizes {
                object.insert(size.id.to_string(), serde_json::json!(size.id + i as i64));
            }
            serde_json::from_value(serde_json::Value::Object(object)).unwrap()
        })
        .collect();
    normalize(&raw_rows, category)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A query that matches nothing produces no file
    #[test]
    fn test_export_of_empty_filter_fails() {
        let category = category(&[30, 31]);
        let rows = rows_for(&category, &["Kingfisher Strong", "Tuborg"]);
        let filtered = filter(&rows, "heineken");
        let totals = aggregate_totals(filtered.iter().copied(), &category.sizes);

        let result = build_export(&filtered, &category.sizes, &totals, &context());

        assert!(result.is_err());
        assert_eq!(result, Err(ExportError::NothingToExport));
    }

    /// Metadata sheet describes the selection and every size
    #[test]
    fn test_report_info_sheet() {
        let category = category(&[30, 31]);
        let rows = rows_for(&category, &["Kingfisher Strong", "Tuborg"]);
        let filtered = filter(&rows, "");
        let totals = aggregate_totals(filtered.iter().copied(), &category.sizes);

        let workbook = build_export(&filtered, &category.sizes, &totals, &context()).unwrap();
        let info = &workbook.info_sheet.rows;

        assert_eq!(workbook.file_name, "Closing_Stock_ALL_SHOPS_Beer_2026-10-19.xlsx");
        assert_eq!(info[1], vec![Cell::text("Shop:"), Cell::text("ALL SHOPS")]);
        assert_eq!(info[4], vec![Cell::text("Total Products:"), Cell::Number(2)]);
        assert_eq!(info[7], vec![Cell::text("Size Information")]);
        assert_eq!(info[8], vec![Cell::text("S30"), Cell::text("Title 30")]);
        assert_eq!(info.len(), 10);
    }

    /// A response for an older selection is discarded
    #[test]
    fn test_dashboard_discards_stale_response() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let beer = category(&[30]);
        let mut state = DashboardState::new(date);
        state.set_categories(vec![beer.clone()]);
        state.select_shop(ShopSelection::All);
        state.select_category("3");

        let first = state.begin_fetch().unwrap();
        state.select_shop(ShopSelection::Specific(2));
        let second = state.begin_fetch().unwrap();

        let stale = StockSnapshot::build(first.key.clone(), &beer, &[], Utc::now());
        assert!(!state.apply_snapshot(&first, stale));

        let key = StockKey {
            shop: ShopSelection::Specific(2),
            category_id: "3".to_string(),
            date,
        };
        let fresh = StockSnapshot::build(key, &beer, &[], Utc::now());
        assert!(state.apply_snapshot(&second, fresh));
        assert_eq!(
            state.snapshot().map(|s| s.key.shop),
            Some(ShopSelection::Specific(2))
        );
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for distinct size ids in an arbitrary declared order
    fn sizes_strategy() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::btree_set(1i64..500, 1..8)
            .prop_map(|ids| ids.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property 6: header and data columns follow the declared size order
        #[test]
        fn prop_export_column_order(size_ids in sizes_strategy(), product_count in 1usize..10) {
            let category = category(&size_ids);
            let names: Vec<String> = (0..product_count).map(|i| format!("Brand {}", i)).collect();
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let rows = rows_for(&category, &name_refs);
            let filtered = filter(&rows, "");
            let totals = aggregate_totals(filtered.iter().copied(), &category.sizes);

            let workbook = build_export(&filtered, &category.sizes, &totals, &context()).unwrap();
            let data = &workbook.data_sheet.rows;

            let header: Vec<Cell> = std::iter::once(Cell::text("Product Name"))
                .chain(size_ids.iter().map(|id| Cell::text(format!("S{}", id))))
                .collect();
            prop_assert_eq!(&data[0], &header);
            prop_assert_eq!(data.len(), product_count + 2);

            for (i, row) in data[1..=product_count].iter().enumerate() {
                let expected: Vec<Cell> = std::iter::once(Cell::text(format!("Brand {}", i)))
                    .chain(size_ids.iter().map(|id| Cell::Number((id + i as i64) as u64)))
                    .collect();
                prop_assert_eq!(row, &expected);
            }

            let total_row = &data[product_count + 1];
            prop_assert_eq!(&total_row[0], &Cell::text("TOTAL"));
            prop_assert_eq!(workbook.data_sheet.column_widths.len(), size_ids.len() + 1);
        }
    }
}
