use std::collections::BTreeSet;

use fightledger_common::{Bout, Category, ClinchRecord, GroundRecord, RawDocument, StrikingRecord};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::cells::{count, pair, text};
use crate::error::ExtractError;

/// Event records of one document, per category, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub striking: Vec<StrikingRecord>,
    pub clinch: Vec<ClinchRecord>,
    pub ground: Vec<GroundRecord>,
    /// Categories whose titled block was absent from the page.
    pub missing: Vec<Category>,
}

impl EventBatch {
    pub fn len(&self) -> usize {
        self.striking.len() + self.clinch.len() + self.ground.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend(&mut self, other: EventBatch) {
        self.striking.extend(other.striking);
        self.clinch.extend(other.clinch);
        self.ground.extend(other.ground);
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Walk the page in document order. A block whose whole text is a category
/// title claims the next table; later tables and repeated titles are ignored.
pub fn extract_events(doc: &RawDocument) -> Result<EventBatch, ExtractError> {
    let html = Html::parse_document(&doc.content);
    let blocks = selector("div, table")?;
    let rows = selector("tr")?;
    let cells = selector("td")?;

    let mut batch = EventBatch::default();
    let mut seen = BTreeSet::new();
    let mut pending: Option<Category> = None;

    for el in html.select(&blocks) {
        if el.value().name() == "table" {
            let Some(category) = pending.take() else {
                continue;
            };
            seen.insert(category);
            let table_rows = table_cells(el, &rows, &cells);
            let kept = push_rows(&mut batch, category, &doc.entity, table_rows);
            debug!(entity = %doc.entity, %category, rows = kept, "Extracted category table");
            continue;
        }

        let title = element_text(el);
        if let Some(category) = Category::ALL
            .into_iter()
            .find(|c| title.eq_ignore_ascii_case(c.title()))
        {
            if !seen.contains(&category) {
                pending = Some(category);
            }
        }
    }

    for category in Category::ALL {
        if !seen.contains(&category) {
            warn!(entity = %doc.entity, %category, "Category block not found");
            batch.missing.push(category);
        }
    }
    Ok(batch)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn table_cells(table: ElementRef<'_>, rows: &Selector, cells: &Selector) -> Vec<Vec<String>> {
    table
        .select(rows)
        .map(|row| row.select(cells).map(element_text).collect::<Vec<_>>())
        .filter(|cells| !is_header(cells))
        .collect()
}

fn is_header(cells: &[String]) -> bool {
    cells.is_empty() || cells[0].eq_ignore_ascii_case("date")
}

fn push_rows(batch: &mut EventBatch, category: Category, player: &str, rows: Vec<Vec<String>>) -> usize {
    let width = category.source_width();
    let mut kept = 0;
    for row in rows.iter().filter(|r| r.len() >= width) {
        let bout = Bout {
            player: player.to_string(),
            date: text(&row[0]),
            opponent: text(&row[1]),
            event: text(&row[2]),
            result: text(&row[3]),
        };
        match category {
            Category::Striking => batch.striking.push(striking(bout, row)),
            Category::Clinch => batch.clinch.push(clinch(bout, row)),
            Category::Ground => batch.ground.push(ground(bout, row)),
        }
        kept += 1;
    }
    if kept < rows.len() {
        debug!(player, %category, discarded = rows.len() - kept, "Discarded short rows");
    }
    kept
}

// Source cell layouts, after Date, Opponent, Event, Result:
//   striking: SDBL/A SDHL/A SDLL/A TSL TSA SSL SSA TSL-TSA KD %BODY %HEAD %LEG
//   clinch:   SCBL SCBA SCHL SCHA SCLL SCLA RV SR TDL TDA TDS TK-ACC
//   ground:   SGBL SGBA SGHL SGHA SGLL SGLA AD ADHG ADTB ADTM ADTS SM

fn striking(bout: Bout, c: &[String]) -> StrikingRecord {
    let (sdbl, sdba) = pair(&c[4]);
    let (sdhl, sdha) = pair(&c[5]);
    let (sdll, sdla) = pair(&c[6]);
    StrikingRecord {
        bout,
        sdbl,
        sdba,
        sdhl,
        sdha,
        sdll,
        sdla,
        tsl: count(&c[7]),
        tsa: count(&c[8]),
        ssl: count(&c[9]),
        ssa: count(&c[10]),
        tsl_tsa: text(&c[11]),
        kd: count(&c[12]),
        pct_body: text(&c[13]),
        pct_head: text(&c[14]),
        pct_leg: text(&c[15]),
    }
}

fn clinch(bout: Bout, c: &[String]) -> ClinchRecord {
    ClinchRecord {
        bout,
        scbl: count(&c[4]),
        scba: count(&c[5]),
        schl: count(&c[6]),
        scha: count(&c[7]),
        scll: count(&c[8]),
        scla: count(&c[9]),
        rv: count(&c[10]),
        sr: count(&c[11]),
        tdl: count(&c[12]),
        tda: count(&c[13]),
        tds: count(&c[14]),
        tk_acc: text(&c[15]),
    }
}

fn ground(bout: Bout, c: &[String]) -> GroundRecord {
    GroundRecord {
        bout,
        sgbl: count(&c[4]),
        sgba: count(&c[5]),
        sghl: count(&c[6]),
        sgha: count(&c[7]),
        sgll: count(&c[8]),
        sgla: count(&c[9]),
        ad: count(&c[10]),
        adhg: count(&c[11]),
        adtb: count(&c[12]),
        adtm: count(&c[13]),
        adts: count(&c[14]),
        sm: count(&c[15]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> String {
        let tds: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
        format!("<tr>{tds}</tr>")
    }

    fn striking_row(date: &str, opponent: &str) -> String {
        row(&[
            date, opponent, "UFC 300", "W", "3/5", "20/41", "4/4", "45", "80", "27", "50", "45-80",
            "1", "11%", "74%", "15%",
        ])
    }

    #[test]
    fn title_claims_next_table() {
        let html = format!(
            "<html><body>\
             <table><tr><td>unrelated</td></tr></table>\
             <div class=\"Table__Title\">striking</div>\
             <div><table><thead><tr><th>Date</th></tr></thead><tbody>{}{}</tbody></table></div>\
             </body></html>",
            striking_row("Apr 13, 2024", "Jon Doe"),
            row(&["short", "row"]),
        );
        let doc = RawDocument::new("Robert Whittaker", html, "u");
        let batch = extract_events(&doc).unwrap();

        assert_eq!(batch.striking.len(), 1);
        let rec = &batch.striking[0];
        assert_eq!(rec.bout.player, "Robert Whittaker");
        assert_eq!(rec.bout.date, "Apr 13, 2024");
        assert_eq!((rec.sdbl, rec.sdba, rec.sdhl, rec.sdha), (3, 5, 20, 41));
        assert_eq!(rec.tsl_tsa, "45-80");
        assert_eq!(rec.pct_head, "74%");
        assert_eq!(batch.missing, vec![Category::Clinch, Category::Ground]);
    }

    #[test]
    fn missing_blocks_yield_empty_batch() {
        let doc = RawDocument::new("A", "<html><body><p>no stats</p></body></html>", "u");
        let batch = extract_events(&doc).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.missing.len(), 3);
    }
}
