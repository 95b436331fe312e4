//! Accumulation: fold a page's records into the run's table.
//!
//! Models repeat the table header on every page, and sometimes in the middle
//! of one. Such rows are recognised by the "connection power" column holding
//! the caption itself, in either supported language, and dropped. Pruning
//! runs over the whole table after every append, keeps the order of the
//! surviving rows and is idempotent.

use crate::output::{Record, ResultTable};
use crate::prompts::{HEADER_MARKERS, HEADER_MARKER_COLUMN};
use tracing::debug;

/// Append `rows` in order, then prune header rows from the whole table.
///
/// Returns the number of rows pruned.
pub fn append(table: &mut ResultTable, rows: Vec<Record>) -> usize {
    table.rows_mut().extend(rows);
    prune_header_rows(table)
}

/// Remove every row whose marker column contains a header caption.
///
/// Returns the number of rows removed.
pub fn prune_header_rows(table: &mut ResultTable) -> usize {
    let before = table.len();
    table.rows_mut().retain(|row| !is_header_row(row));
    let pruned = before - table.len();
    if pruned > 0 {
        debug!("Pruned {} repeated header row(s)", pruned);
    }
    pruned
}

/// Case-sensitive substring match of the marker column against the captions.
pub fn is_header_row(row: &Record) -> bool {
    row.get(HEADER_MARKER_COLUMN)
        .is_some_and(|value| HEADER_MARKERS.iter().any(|marker| value.contains(marker)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Locale;
    use crate::output::Schema;
    use crate::pipeline::parse::parse_records;

    fn register() -> ResultTable {
        ResultTable::new(Schema::connection_register(Locale::Pl))
    }

    fn row(entity: &str, power: &str) -> Record {
        Record::fit([entity, "", "", power], 9)
    }

    #[test]
    fn append_preserves_order() {
        let mut t = register();
        append(&mut t, vec![row("a", "1"), row("b", "2")]);
        append(&mut t, vec![row("c", "3")]);
        let entities: Vec<&str> = t.rows().iter().map(|r| r.get(0).unwrap()).collect();
        assert_eq!(entities, vec!["a", "b", "c"]);
    }

    #[test]
    fn repeated_header_row_is_pruned_with_siblings_kept() {
        let text = "Podmiot,Siedziba,Lokalizacja,Moc przyłączeniowa [kW],Rodzaj\n\
                    Firma A,Gdańsk,GPZ 1,500,PV\n\
                    Header,x,y,Moc przyłączeniowa,z\n\
                    Firma B,Sopot,GPZ 2,750,wiatr\n";
        let mut t = register();
        let rows = parse_records(text, t.schema());
        assert_eq!(rows.len(), 3);

        let pruned = append(&mut t, rows);
        assert_eq!(pruned, 1);
        let entities: Vec<&str> = t.rows().iter().map(|r| r.get(0).unwrap()).collect();
        assert_eq!(entities, vec!["Firma A", "Firma B"]);
    }

    #[test]
    fn english_marker_is_recognised() {
        assert!(is_header_row(&row("Entity", "Connection power [kW]")));
    }

    #[test]
    fn match_is_case_sensitive_and_column_specific() {
        assert!(!is_header_row(&row("x", "moc przyłączeniowa")));
        assert!(!is_header_row(&row("Moc przyłączeniowa", "12")));
        assert!(!is_header_row(&Record::fit(["a", "b"], 2)));
    }

    #[test]
    fn pruning_is_idempotent() {
        let mut t = register();
        t.rows_mut().extend([
            row("a", "1"),
            row("hdr", "Moc przyłączeniowa [kW]"),
            row("b", "2"),
            row("hdr2", "Connection power"),
        ]);
        prune_header_rows(&mut t);
        let once = t.clone();
        assert_eq!(prune_header_rows(&mut t), 0);
        assert_eq!(t, once);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn empty_page_changes_nothing() {
        let mut t = register();
        append(&mut t, vec![row("a", "1")]);
        assert_eq!(append(&mut t, Vec::new()), 0);
        assert_eq!(t.len(), 1);
    }
}
