use flaghunt::models::{CrawledPage, Form, FormField, Vulnerability};
use flaghunt::queue::{ExploitationQueue, FORM_FIELD_CONFIDENCE, GENERIC_FORM_PAYLOADS};

fn search_page() -> CrawledPage {
    let mut page = CrawledPage::new("http://t/search", 200);
    page.forms.push(Form {
        action: "http://t/search".into(),
        method: "GET".into(),
        fields: vec![FormField { name: "q".into(), field_type: "text".into(), value: String::new(), required: false }],
    });
    page
}

#[test]
fn test_queue_orders_by_confidence() {
    let vulns = vec![
        Vulnerability::new("xss", "http://t/comment", 0.3).with_vectors(&["reflected"]).with_payloads(&["<b>"]),
        Vulnerability::new("sql_injection", "http://t/search", 0.9)
            .with_vectors(&["union"])
            .with_payloads(&["' UNION SELECT 1--", "' OR 1=1--"]),
    ];
    let mut queue = ExploitationQueue::new();
    let added = queue.populate(&vulns, &[search_page()], &[]);
    assert_eq!(added, 3 + GENERIC_FORM_PAYLOADS.len());

    let confidences: Vec<f64> = queue.iter().map(|t| t.confidence).collect();
    let mut sorted = confidences.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));
    assert_eq!(confidences, sorted);

    // ties keep the order the payloads were suggested in
    let first = queue.pop_next().unwrap();
    assert_eq!(first.payload, "' UNION SELECT 1--");
    assert_eq!(first.method, "GET");
    assert!(first.parameters.contains_key("q"));
    assert_eq!(queue.pop_next().unwrap().payload, "' OR 1=1--");
    assert_eq!(queue.peek().unwrap().confidence, FORM_FIELD_CONFIDENCE);
    assert_eq!(queue.iter().last().unwrap().vulnerability_type, "xss");
}
