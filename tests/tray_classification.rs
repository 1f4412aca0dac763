use mbff_tray::*;
use pretty_assertions::assert_eq;

const LIBRARY: &str = "\
DieSize 0 0 40 10
Cell INV 1 1 combinational
Pin A 0 0.5 input
Pin Y 1 0.5 output
Cell DFF 2 1 sequential rising
Pin D 0 0.5 data
Pin Q 2 0.5 q
Pin CK 1 0 clock
Cell MBFF2 4 1 sequential rising
Pin D0 0 0.5 data
Pin D1 2 0.5 data
Pin Q0 1 0.5 q
Pin Q1 3 0.5 q
Pin CK0 0.5 0 clock
Pin CK1 2.5 0 clock
Cell MBFF2SE 4 1 sequential rising
Pin D0 0 0.5 data
Pin D1 2 0.5 data
Pin Q0 1 0.5 q
Pin Q1 3 0.5 q
Pin CK0 0.5 0 clock
Pin CK1 2.5 0 clock
Pin SI0 0.2 1 scan_in
Pin SI1 2.2 1 scan_in
Pin SE 1.8 1 scan_enable
Cell MBFF2CLPS 4 1 sequential rising
Pin D0 0 0.5 data
Pin D1 2 0.5 data
Pin Q0 1 0.5 q
Pin Q1 3 0.5 q
Pin CK 1.5 0 clock
Cell MBFF2SECLPS 4 1 sequential rising
Pin D[0] 0 0.5 data
Pin D[1] 2 0.5 data
Pin Q[0] 1 0.5 q
Pin Q[1] 3 0.5 q
Pin CK 1.5 0 clock
Pin SI[0] 0.2 1 scan_in
Pin SI[1] 2.2 1 scan_in
Pin SE 1.8 1 scan_enable
";

#[test]
fn four_trays_and_two_rejects() {
    let design = DesignContext::parse(LIBRARY).unwrap();
    let verdicts = design
        .masters()
        .map(|m| (m.name.as_str(), TrayCatalog::is_valid_tray(m)))
        .collect::<Vec<_>>();
    assert_eq!(
        verdicts,
        vec![
            ("INV", false),
            ("DFF", false),
            ("MBFF2", true),
            ("MBFF2SE", true),
            ("MBFF2CLPS", true),
            ("MBFF2SECLPS", true),
        ]
    );

    let catalog = TrayCatalog::new(&design);
    assert_eq!(catalog.len(), 4);
    assert!(catalog.issues().is_empty());
    assert!(catalog.trays().all(|t| t.capacity() == 2));
    assert_eq!(catalog.trays().filter(|t| t.has_scan()).count(), 2);
    assert_eq!(catalog.trays().filter(|t| t.layout.clock_collapsed).count(), 2);
    // single-bit flops keep a layout for inventory lookups
    assert_eq!(catalog.layout("DFF").map(|l| l.capacity()), Some(1));
    assert!(catalog.layout("INV").is_none());
}

#[test]
fn classification_is_stable_across_calls() {
    let design = DesignContext::parse(LIBRARY).unwrap();
    for master in design.masters() {
        let first = TrayCatalog::is_valid_tray(master);
        assert!((0..5).all(|_| TrayCatalog::is_valid_tray(master) == first));
    }
}

#[test]
fn malformed_masters_are_reported_not_fatal() {
    let text = format!(
        "{LIBRARY}\
Cell BROKEN2 4 1 sequential rising
Pin D0 0 0.5 data
Pin D1 2 0.5 data
Pin Q0 1 0.5 q
Pin CK 1.5 0 clock
Cell HALFSCAN2 4 1 sequential rising
Pin D0 0 0.5 data
Pin D1 2 0.5 data
Pin Q0 1 0.5 q
Pin Q1 3 0.5 q
Pin CK 1.5 0 clock
Pin SI0 0.2 1 scan_in
Pin SE 1.8 1 scan_enable
"
    );
    let design = DesignContext::parse(&text).unwrap();
    let catalog = TrayCatalog::new(&design);
    assert_eq!(catalog.len(), 4);
    assert_eq!(
        catalog.issues(),
        &[
            ClassifyError::MissingSlotPin {
                master: "BROKEN2".to_string(),
                bit: 1,
                role: "data-out",
            },
            ClassifyError::PartialScan {
                master: "HALFSCAN2".to_string(),
            },
        ]
    );
}
