use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use super::errors::ImportError;

const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const EXPORT_ENDPOINT: &str = "https://docs.google.com/spreadsheets/d";

// Matches HYPERLINK("url", "display") and HYPERLINK("url").
static HYPERLINK_FORMULA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"HYPERLINK\("([^"]+)""#).unwrap());

#[derive(Debug, Deserialize)]
struct GridResponse {
    sheets: Option<Vec<SheetGrid>>,
}

#[derive(Debug, Deserialize)]
struct SheetGrid {
    properties: Option<SheetProperties>,
    data: Option<Vec<GridData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    row_data: Option<Vec<RowData>>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    values: Option<Vec<CellData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    formatted_value: Option<String>,
    hyperlink: Option<String>,
    user_entered_value: Option<ExtendedValue>,
    effective_value: Option<ExtendedValue>,
    text_format_runs: Option<Vec<TextFormatRun>>,
    chip_runs: Option<Vec<ChipRun>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendedValue {
    formula_value: Option<String>,
    hyperlink: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextFormatRun {
    link: Option<RunLink>,
}

#[derive(Debug, Deserialize)]
struct RunLink {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChipRun {
    chip: Option<Chip>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chip {
    rich_link_properties: Option<RichLinkProperties>,
}

#[derive(Debug, Deserialize)]
struct RichLinkProperties {
    uri: Option<String>,
}

pub struct SheetsClient {
    client: Client,
}

impl SheetsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch one worksheet as CSV text via the public export endpoint. No
    /// credentials involved; a non-success status is fatal for the source.
    pub async fn fetch_csv(&self, spreadsheet_id: &str, gid: u64) -> anyhow::Result<String> {
        let url = format!("{EXPORT_ENDPOINT}/{spreadsheet_id}/export?format=csv&gid={gid}");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::GoogleApi {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(response.text().await?)
    }

    /// Fetch the true hyperlink targets behind the cells of one column,
    /// keyed by 0-based data row index (the header row is excluded). The
    /// column is located by matching the header cell's displayed value.
    pub async fn fetch_hyperlinks(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        gid: u64,
        column_header: &str,
    ) -> anyhow::Result<HashMap<usize, String>> {
        let url = format!("{SHEETS_ENDPOINT}/{spreadsheet_id}");
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("includeGridData", "true"),
                (
                    "fields",
                    "sheets(properties(sheetId),data(rowData(values(\
                     formattedValue,hyperlink,effectiveValue,userEnteredValue,\
                     textFormatRuns,chipRuns))))",
                ),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ImportError::GoogleApi {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let payload = serde_json::from_str::<GridResponse>(&body)?;
        Ok(collect_column_hyperlinks(payload, gid, column_header))
    }
}

fn collect_column_hyperlinks(
    payload: GridResponse,
    gid: u64,
    column_header: &str,
) -> HashMap<usize, String> {
    let mut hyperlinks = HashMap::new();

    let Some(sheet) = payload.sheets.into_iter().flatten().find(|sheet| {
        sheet
            .properties
            .as_ref()
            .and_then(|p| p.sheet_id)
            .is_some_and(|id| id == gid)
    }) else {
        return hyperlinks;
    };

    let Some(rows) = sheet
        .data
        .into_iter()
        .flatten()
        .next()
        .and_then(|data| data.row_data)
    else {
        return hyperlinks;
    };

    let Some(column_index) = rows.first().and_then(|header| {
        header.values.as_ref().and_then(|cells| {
            cells.iter().position(|cell| {
                cell.formatted_value.as_deref().map(str::trim) == Some(column_header)
            })
        })
    }) else {
        return hyperlinks;
    };

    for (row_idx, row) in rows.iter().skip(1).enumerate() {
        let Some(cell) = row.values.as_ref().and_then(|cells| cells.get(column_index)) else {
            continue;
        };

        if let Some(url) = extract_hyperlink(cell) {
            hyperlinks.insert(row_idx, url);
        }
    }

    hyperlinks
}

/// Pull a hyperlink out of one grid cell, checking in order: the direct
/// hyperlink property, a HYPERLINK() formula, the effective value, Drive
/// smart chips, and formatted text runs.
fn extract_hyperlink(cell: &CellData) -> Option<String> {
    if let Some(url) = cell.hyperlink.as_deref().filter(|v| !v.is_empty()) {
        return Some(url.to_string());
    }

    if let Some(formula) = cell
        .user_entered_value
        .as_ref()
        .and_then(|v| v.formula_value.as_deref())
    {
        if let Some(captures) = HYPERLINK_FORMULA_RE.captures(formula) {
            return Some(captures[1].to_string());
        }
    }

    if let Some(url) = cell
        .effective_value
        .as_ref()
        .and_then(|v| v.hyperlink.as_deref())
        .filter(|v| !v.is_empty())
    {
        return Some(url.to_string());
    }

    if let Some(url) = cell.chip_runs.iter().flatten().find_map(|run| {
        run.chip
            .as_ref()
            .and_then(|chip| chip.rich_link_properties.as_ref())
            .and_then(|props| props.uri.clone())
    }) {
        return Some(url);
    }

    cell.text_format_runs
        .iter()
        .flatten()
        .find_map(|run| run.link.as_ref().and_then(|link| link.uri.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(json: serde_json::Value) -> CellData {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn extract_prefers_direct_hyperlink() {
        let cell = cell(serde_json::json!({
            "hyperlink": "https://drive.google.com/file/d/abc/view",
            "textFormatRuns": [{"link": {"uri": "https://other.example.com"}}],
        }));
        assert_eq!(
            extract_hyperlink(&cell).as_deref(),
            Some("https://drive.google.com/file/d/abc/view")
        );
    }

    #[test]
    fn extract_reads_hyperlink_formula() {
        let cell = cell(serde_json::json!({
            "userEnteredValue": {
                "formulaValue": "=HYPERLINK(\"https://example.com/resume.pdf\", \"resume.pdf\")"
            }
        }));
        assert_eq!(
            extract_hyperlink(&cell).as_deref(),
            Some("https://example.com/resume.pdf")
        );
    }

    #[test]
    fn extract_reads_smart_chips_and_text_runs() {
        let chip = cell(serde_json::json!({
            "chipRuns": [{"chip": {"richLinkProperties": {"uri": "https://chip.example.com"}}}]
        }));
        assert_eq!(extract_hyperlink(&chip).as_deref(), Some("https://chip.example.com"));

        let run = cell(serde_json::json!({
            "textFormatRuns": [{"link": {"uri": "https://run.example.com"}}]
        }));
        assert_eq!(extract_hyperlink(&run).as_deref(), Some("https://run.example.com"));
    }

    #[test]
    fn extract_returns_none_for_plain_cells() {
        let plain = cell(serde_json::json!({"formattedValue": "zhang_san.pdf"}));
        assert_eq!(extract_hyperlink(&plain), None);
    }

    #[test]
    fn collect_maps_rows_by_header_column() {
        let payload: GridResponse = serde_json::from_value(serde_json::json!({
            "sheets": [{
                "properties": {"sheetId": 127001815},
                "data": [{
                    "rowData": [
                        {"values": [{"formattedValue": "名字"}, {"formattedValue": "履歷"}]},
                        {"values": [
                            {"formattedValue": "張三"},
                            {"formattedValue": "zhang.pdf", "hyperlink": "https://example.com/zhang.pdf"}
                        ]},
                        {"values": [{"formattedValue": "李四"}, {"formattedValue": "li.pdf"}]}
                    ]
                }]
            }]
        }))
        .unwrap();

        let links = collect_column_hyperlinks(payload, 127001815, "履歷");
        assert_eq!(links.len(), 1);
        assert_eq!(links.get(&0).map(String::as_str), Some("https://example.com/zhang.pdf"));
    }

    #[test]
    fn collect_ignores_non_matching_worksheets() {
        let payload: GridResponse = serde_json::from_value(serde_json::json!({
            "sheets": [{
                "properties": {"sheetId": 1},
                "data": [{"rowData": [{"values": [{"formattedValue": "履歷"}]}]}]
            }]
        }))
        .unwrap();

        assert!(collect_column_hyperlinks(payload, 2, "履歷").is_empty());
    }
}
