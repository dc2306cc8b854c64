//! Property tests for naming and normalisation invariants.
//!
//! Uses proptest to verify:
//! 1. Snapshot file names round-trip through the parser for every calendar date
//! 2. Arbitrary file names never panic the parser, and only real dates parse
//! 3. Integer codes always normalise to `<code><suffix>`
//! 4. Column letters round-trip

use chrono::NaiveDate;
use pricebook_core::cache::store::{parse_snapshot_file_name, snapshot_file_name};
use pricebook_core::cache::DateKey;
use pricebook_core::sheet::{normalize_code, CellValue, Column};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1i32..=9999, 1u32..=12, 1u32..=31)
        .prop_filter_map("valid calendar date", |(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d)
        })
}

// ── 1. Snapshot names ────────────────────────────────────────────────

proptest! {
    #[test]
    fn snapshot_name_round_trips(date in arb_date()) {
        let key = DateKey::new(date);
        let name = snapshot_file_name(key);
        prop_assert_eq!(parse_snapshot_file_name(&name), Some(key));
        prop_assert_eq!(name.len(), "yf_cache_YYYY-MM-DD.json".len());
    }

    #[test]
    fn arbitrary_names_never_panic(name in "\\PC{0,40}") {
        if let Some(key) = parse_snapshot_file_name(&name) {
            prop_assert_eq!(snapshot_file_name(key), name);
        }
    }

    #[test]
    fn date_keys_survive_json_as_map_keys(date in arb_date()) {
        let key = DateKey::new(date);
        let json = serde_json::to_string(&key).unwrap();
        let back: DateKey = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, key);
    }
}

// ── 2. Code normalisation ────────────────────────────────────────────

proptest! {
    #[test]
    fn integer_codes_get_suffix(code in 1000u32..100_000, frac in 0.0f64..0.99) {
        let expected = format!("{code}.T");

        let as_number = normalize_code(&CellValue::Number(code as f64 + frac), ".T").unwrap();
        prop_assert_eq!(as_number.as_str(), expected.as_str());

        let as_text = normalize_code(&CellValue::Text(format!("  {code} ")), ".T").unwrap();
        prop_assert_eq!(as_text.as_str(), expected.as_str());
    }

    #[test]
    fn symbols_are_trimmed_verbatim(symbol in "[A-Z]{1,5}(\\.[A-Z]{1,2})?") {
        let ticker = normalize_code(&CellValue::Text(format!(" {symbol}\t")), ".T").unwrap();
        prop_assert_eq!(ticker.as_str(), symbol.as_str());
    }
}

// ── 3. Column letters ────────────────────────────────────────────────

proptest! {
    #[test]
    fn column_letters_round_trip(index in 0usize..16_384) {
        let column = Column::from_index(index);
        let parsed = Column::from_letters(&column.to_string()).unwrap();
        prop_assert_eq!(parsed, column);
    }
}
