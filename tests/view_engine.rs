use tx_sentry::view::{
    clamp_page, total_pages, view, Query, SortDirection, SortState, StatusFilter, ViewRow,
    FRAUDULENT,
};

#[derive(Debug, Clone, PartialEq)]
struct Tx {
    id: u32,
    address: &'static str,
    balance: &'static str,
    flag: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Id,
    Balance,
}

impl ViewRow for Tx {
    type Field = Field;

    fn status(&self) -> &str {
        if self.flag == "1" { "Fraudulent" } else { "Legitimate" }
    }

    fn search_fields(&self) -> Vec<String> {
        vec![self.id.to_string(), self.address.to_string()]
    }

    fn sort_value(&self, field: Field) -> f64 {
        match field {
            Field::Id => self.id as f64,
            Field::Balance => self.balance.parse().unwrap_or(0.0),
        }
    }
}

fn tx(id: u32, address: &'static str, balance: &'static str, flag: &'static str) -> Tx {
    Tx {
        id,
        address,
        balance,
        flag,
    }
}

fn ids(rows: &[&Tx]) -> Vec<u32> {
    rows.iter().map(|r| r.id).collect()
}

fn sample() -> Vec<Tx> {
    vec![
        tx(1, "0xAAA", "5", "0"),
        tx(2, "0xBBB", "3", "1"),
        tx(3, "0xCCC", "3", "0"),
    ]
}

#[test]
fn ascending_sort_keeps_ties_in_input_order() {
    let records = sample();
    let mut q = Query::new(10);
    q.sort = SortState::by(Field::Balance, SortDirection::Asc);

    let page = view(&records, &q);
    assert_eq!(ids(&page.rows), vec![2, 3, 1]);
    assert_eq!(page.total_matching, 3);
    assert_eq!(page.total_pages, 1);
}

#[test]
fn descending_sort_is_stable_too() {
    let records = sample();
    let mut q = Query::new(10);
    q.sort = SortState::by(Field::Balance, SortDirection::Desc);
    assert_eq!(ids(&view(&records, &q).rows), vec![1, 2, 3]);
}

#[test]
fn status_filter_selects_fraudulent() {
    let records = sample();
    let mut q = Query::new(10);
    q.status = "Fraudulent".parse().unwrap();
    assert_eq!(q.status, StatusFilter::Only(FRAUDULENT.to_string()));
    assert_eq!(ids(&view(&records, &q).rows), vec![2]);

    q.status = "all".parse().unwrap();
    assert_eq!(view(&records, &q).total_matching, 3);
}

#[test]
fn search_is_case_insensitive_over_any_field() {
    let records = sample();
    let mut q = Query::new(10);
    q.search = "0xbb".into();
    assert_eq!(ids(&view(&records, &q).rows), vec![2]);

    q.search = "3".into();
    assert_eq!(ids(&view(&records, &q).rows), vec![3]);

    q.search = "zzz".into();
    let page = view(&records, &q);
    assert!(page.rows.is_empty());
    assert_eq!(page.total_pages, 0);
}

#[test]
fn stages_combine_filter_then_search_then_sort() {
    let records = vec![
        tx(1, "0xdead01", "9", "1"),
        tx(2, "0xbeef02", "1", "1"),
        tx(3, "0xdead03", "4", "0"),
        tx(4, "0xdead04", "2", "1"),
    ];
    let mut q = Query::new(10);
    q.status = StatusFilter::Only("Fraudulent".into());
    q.search = "DEAD".into();
    q.sort = SortState::by(Field::Balance, SortDirection::Asc);
    assert_eq!(ids(&view(&records, &q).rows), vec![4, 1]);
}

#[test]
fn unparsable_sort_values_read_as_zero() {
    let records = vec![tx(1, "a", "2", "0"), tx(2, "b", "oops", "0"), tx(3, "c", "-1", "0")];
    let mut q = Query::new(10);
    q.sort = SortState::by(Field::Balance, SortDirection::Asc);
    assert_eq!(ids(&view(&records, &q).rows), vec![3, 2, 1]);
}

#[test]
fn toggle_cycles_and_returns_to_input_order() {
    let records = sample();
    let mut q = Query::new(10);
    let original = ids(&view(&records, &q).rows);

    q.sort = q.sort.toggle(Field::Balance);
    assert_eq!(q.sort.active(), Some((Field::Balance, SortDirection::Asc)));
    q.sort = q.sort.toggle(Field::Balance);
    assert_eq!(q.sort.active(), Some((Field::Balance, SortDirection::Desc)));
    q.sort = q.sort.toggle(Field::Balance);
    assert_eq!(q.sort.active(), None);

    assert_eq!(ids(&view(&records, &q).rows), original);
}

#[test]
fn selecting_another_field_restarts_ascending() {
    let sort = SortState::none()
        .toggle(Field::Balance)
        .toggle(Field::Balance)
        .toggle(Field::Id);
    assert_eq!(sort.active(), Some((Field::Id, SortDirection::Asc)));
}

#[test]
fn view_is_deterministic() {
    let records = sample();
    let mut q = Query::new(2);
    q.sort = SortState::by(Field::Balance, SortDirection::Desc);
    assert_eq!(view(&records, &q), view(&records, &q));
}

#[test]
fn pagination_slices_pages() {
    let records: Vec<Tx> = (1..=23).map(|i| tx(i, "0x", "0", "0")).collect();
    let mut q = Query::new(10);

    let first = view(&records, &q);
    assert_eq!(first.total_pages, 3);
    assert_eq!(ids(&first.rows), (1..=10).collect::<Vec<_>>());

    q.page = 3;
    let last = view(&records, &q);
    assert_eq!(ids(&last.rows), vec![21, 22, 23]);
    assert_eq!(last.total_matching, 23);
}

#[test]
fn page_helpers() {
    assert_eq!(total_pages(0, 10), 0);
    assert_eq!(total_pages(10, 10), 1);
    assert_eq!(total_pages(11, 10), 2);
    assert_eq!(clamp_page(5, 0), 1);
    assert_eq!(clamp_page(0, 3), 1);
    assert_eq!(clamp_page(9, 3), 3);
}
