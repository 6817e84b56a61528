use chrono::NaiveDate;
use proptest::prelude::*;

use receiving_api::{store::format_receipt_no, Pagination};

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid calendar date"))
}

proptest! {
    #[test]
    fn receipt_numbers_keep_their_shape(date in any_date(), sequence in 1u64..1_000_000) {
        let receipt_no = format_receipt_no(date, sequence);
        let parts: Vec<&str> = receipt_no.split('-').collect();

        prop_assert_eq!(parts.len(), 3);
        prop_assert_eq!(parts[0], "RCV");
        prop_assert_eq!(parts[1], date.format("%Y%m%d").to_string());
        prop_assert_eq!(parts[2].len(), 6);
        prop_assert_eq!(parts[2].parse::<u64>().unwrap(), sequence);
    }

    #[test]
    fn distinct_sequences_give_distinct_numbers(
        date in any_date(),
        a in 1u64..10_000_000,
        b in 1u64..10_000_000,
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(format_receipt_no(date, a), format_receipt_no(date, b));
    }

    #[test]
    fn has_more_matches_remaining_rows(
        total in 0u64..10_000,
        limit in 1u64..500,
        offset in 0u64..10_000,
    ) {
        let pagination = Pagination::new(total, limit, offset);

        prop_assert_eq!(pagination.has_more, offset + limit < total);
        prop_assert_eq!(pagination.limit, limit);
        prop_assert_eq!(pagination.offset, offset);
    }
}
