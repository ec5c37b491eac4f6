use docx_rs::{
    read_docx, DocumentChild, InsertChild, Paragraph, ParagraphChild, Run, RunChild,
    StructuredDataTag, StructuredDataTagChild, Table, TableCellContent, TableChild,
    TableRowChild,
};

use super::ExtractError;

/// Reads the document body part and returns its run text, one line per paragraph.
///
/// Paragraphs nested in tables, content controls and hyperlinks are walked in
/// document order, so a resume laid out in a table still yields its text.
pub(super) fn extract_docx(data: &[u8]) -> Result<String, ExtractError> {
    let docx = read_docx(data).map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut text = String::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => push_paragraph(&mut text, paragraph),
            DocumentChild::Table(table) => push_table(&mut text, table),
            DocumentChild::StructuredDataTag(sdt) => push_sdt(&mut text, sdt),
            _ => {}
        }
    }
    Ok(text)
}

fn push_paragraph(text: &mut String, paragraph: &Paragraph) {
    push_paragraph_children(text, &paragraph.children);
    text.push('\n');
}

fn push_paragraph_children(text: &mut String, children: &[ParagraphChild]) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(text, run),
            ParagraphChild::Hyperlink(link) => push_paragraph_children(text, &link.children),
            ParagraphChild::Insert(insert) => {
                for insert_child in &insert.children {
                    if let InsertChild::Run(run) = insert_child {
                        push_run(text, run);
                    }
                }
            }
            ParagraphChild::StructuredDataTag(sdt) => push_sdt(text, sdt),
            _ => {}
        }
    }
}

fn push_run(text: &mut String, run: &Run) {
    for run_child in &run.children {
        match run_child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push('\t'),
            _ => {}
        }
    }
}

fn push_table(text: &mut String, table: &Table) {
    for TableChild::TableRow(row) in &table.rows {
        for TableRowChild::TableCell(cell) in &row.cells {
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(paragraph) => push_paragraph(text, paragraph),
                    TableCellContent::Table(nested) => push_table(text, nested),
                    TableCellContent::StructuredDataTag(sdt) => push_sdt(text, sdt),
                    TableCellContent::TableOfContents(_) => {}
                }
            }
        }
    }
}

fn push_sdt(text: &mut String, sdt: &StructuredDataTag) {
    for child in &sdt.children {
        match child {
            StructuredDataTagChild::Run(run) => push_run(text, run),
            StructuredDataTagChild::Paragraph(paragraph) => push_paragraph(text, paragraph),
            StructuredDataTagChild::Table(table) => push_table(text, table),
            StructuredDataTagChild::StructuredDataTag(nested) => push_sdt(text, nested),
            _ => {}
        }
    }
}
