use tx_sentry::{
    classifier::{ClassificationResult, Label},
    record::RawRecord,
    report::{resolve_flag, DerivedStats, ProcessedRow, ResultSet},
    util::{millis_to_rfc3339, round2},
};

#[test]
fn empty_input_has_zero_percent() {
    let stats = DerivedStats::from_flags(Vec::new());
    assert_eq!(stats, DerivedStats::default());
}

#[test]
fn percent_is_rounded_to_two_decimals() {
    let stats = DerivedStats::from_flags([1, 0, 0]);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.fraudulent, 1);
    assert_eq!(stats.legitimate(), 2);
    assert_eq!(stats.fraud_percent, 33.33);
    assert_eq!(round2(2.0 / 3.0 * 100.0), 66.67);
}

#[test]
fn explicit_flag_overrides_model_label() {
    let row = RawRecord::from_pairs([("FLAG", " 0 ")]);
    assert_eq!(resolve_flag(&row, Label::Fraud), 0);

    let row = RawRecord::from_pairs([("FLAG", "yes")]);
    assert_eq!(resolve_flag(&row, Label::Fraud), 1);
    assert_eq!(resolve_flag(&RawRecord::new(), Label::Legitimate), 0);
}

#[test]
fn dashboard_counts_only_explicit_flags() {
    let records = vec![
        RawRecord::from_pairs([("FLAG", "1")]),
        RawRecord::from_pairs([("FLAG", "0")]),
        RawRecord::from_pairs([("FLAG", "")]),
        RawRecord::new(),
    ];
    let stats = DerivedStats::from_records(&records);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.fraudulent, 1);
    assert_eq!(stats.fraud_percent, 25.0);
}

#[test]
fn processed_row_projects_reduced_fields() {
    let row = RawRecord::from_pairs([
        ("Address", "0xfeed"),
        ("total ether balance", "12.5"),
        ("total Ether sent", "x"),
        ("total ether received", "4"),
    ]);
    let p = ProcessedRow::new(
        &row,
        ClassificationResult {
            label: Label::Fraud,
            probability: 80.0,
        },
    );
    assert_eq!(p.address, "0xfeed");
    assert_eq!(p.total_ether_balance, 12.5);
    assert_eq!(p.total_ether_sent, 0.0);
    assert_eq!(p.total_ether_received, 4.0);
    assert_eq!(p.flag, 1);

    let set = ResultSet::new("f.csv", vec![p]);
    let summary = set.summary();
    assert_eq!(summary.id, set.id);
    assert_eq!(summary.stats.fraud_percent, 100.0);
    let json = serde_json::to_string(&set).unwrap();
    assert!(!json.contains("source_digest"));
}

#[test]
fn timestamps_render_as_rfc3339() {
    assert_eq!(millis_to_rfc3339(0), "1970-01-01T00:00:00Z");
}
