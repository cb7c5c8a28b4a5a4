#![cfg(all(feature = "docx", feature = "xlsx"))]

mod common;

#[cfg(test)]
mod tests {
    use super::common;
    use anyhow::Result;
    use pii_masker::document::{extract_text, FallbackEncoding};
    use pii_masker::{mask_content, ActiveCategories, DocumentFormat, ExemptionSet, SourceDocument};

    fn letter() -> Vec<u8> {
        let body = [
            common::paragraph("Contact ", "bob@ex.com"),
            common::table(&["SSN 123-45-6789", "plain"]),
            common::paragraph("Call ", "212-555-0199"),
        ]
        .concat();
        common::docx(&body)
    }

    fn extract(format: DocumentFormat, bytes: &[u8]) -> Result<String> {
        Ok(extract_text(format, bytes, FallbackEncoding::Latin1)?)
    }

    #[test]
    fn test_docx_extraction_covers_tables() -> Result<()> {
        let text = extract(DocumentFormat::Docx, &letter())?;
        assert_eq!(text, "Contact bob@ex.com\nSSN 123-45-6789\nplain\nCall 212-555-0199");
        Ok(())
    }

    #[test]
    fn test_docx_rebuild_keeps_structure() -> Result<()> {
        let bytes = letter();
        let text = extract(DocumentFormat::Docx, &bytes)?;
        let source = SourceDocument {
            bytes: &bytes,
            filename: "letter.docx",
        };

        let out = mask_content(&text, Some(source), &ActiveCategories::all(), &ExemptionSet::new());
        assert_eq!(out.stats.total, 3);
        assert!(out.warnings.is_empty());

        let artifact = out.artifact.expect("docx artifact");
        assert_eq!(artifact.filename, "masked_letter.docx");
        assert_eq!(
            extract(DocumentFormat::Docx, &artifact.bytes)?,
            "Contact ******@***.**\nSSN ***-**-****\nplain\nCall [PHONE-REDACTED]"
        );

        let xml = common::read_part(&artifact.bytes, "word/document.xml");
        assert!(xml.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert!(xml.contains("<w:rPr><w:b/></w:rPr>"));
        assert!(xml.contains("<w:tbl><w:tr><w:tc>"));
        assert_eq!(common::read_part(&artifact.bytes, "word/styles.xml"), common::STYLES);
        assert_eq!(common::part_names(&artifact.bytes), common::part_names(&bytes));
        Ok(())
    }

    #[test]
    fn test_docx_exemptions_survive_in_file() -> Result<()> {
        let bytes = letter();
        let text = extract(DocumentFormat::Docx, &bytes)?;
        let exemptions: ExemptionSet = ["bob@ex.com"].into_iter().collect();
        let source = SourceDocument {
            bytes: &bytes,
            filename: "letter.docx",
        };

        let out = mask_content(&text, Some(source), &ActiveCategories::all(), &exemptions);
        let rebuilt = extract(DocumentFormat::Docx, &out.artifact.expect("docx artifact").bytes)?;
        assert!(rebuilt.contains("bob@ex.com"));
        assert!(!rebuilt.contains("212-555-0199"));
        Ok(())
    }

    #[test]
    fn test_grid_redacts_string_cells_only() -> Result<()> {
        let bytes = common::contact_grid();
        let text = extract(DocumentFormat::Xlsx, &bytes)?;
        assert_eq!(text, "Email: a@b.com 42 SSN 123-45-6789");

        let source = SourceDocument {
            bytes: &bytes,
            filename: "book.xlsx",
        };
        let out = mask_content(&text, Some(source), &ActiveCategories::all(), &ExemptionSet::new());
        let artifact = out.artifact.expect("xlsx artifact");
        assert_eq!(artifact.filename, "masked_book.xlsx");
        assert_eq!(
            extract(DocumentFormat::Xlsx, &artifact.bytes)?,
            "Email: ******@***.** 42 SSN ***-**-****"
        );

        let sheet = common::read_part(&artifact.bytes, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet, common::read_part(&bytes, "xl/worksheets/sheet1.xml"));
        assert!(sheet.contains(r#"<c r="B1"><v>42</v></c>"#));
        Ok(())
    }

    #[test]
    fn test_grid_never_touches_numbers_or_formulas() -> Result<()> {
        let bytes = common::xlsx(
            &[],
            &[
                r#"<c r="A1"><v>2125550199</v></c>"#,
                r#"<c r="B1" t="str"><f>"a@b.com"</f><v>a@b.com</v></c>"#,
            ],
        );
        let text = extract(DocumentFormat::Xlsx, &bytes)?;
        assert_eq!(text, "2125550199 a@b.com");

        let source = SourceDocument {
            bytes: &bytes,
            filename: "calc.xlsx",
        };
        let out = mask_content(&text, Some(source), &ActiveCategories::all(), &ExemptionSet::new());
        assert_eq!(out.text, "[PHONE-REDACTED] ******@***.**");

        let artifact = out.artifact.expect("xlsx artifact");
        assert_eq!(
            common::read_part(&artifact.bytes, "xl/worksheets/sheet1.xml"),
            common::read_part(&bytes, "xl/worksheets/sheet1.xml")
        );
        assert_eq!(extract(DocumentFormat::Xlsx, &artifact.bytes)?, text);
        Ok(())
    }

    #[test]
    fn test_corrupt_upload_still_masks_text() {
        let source = SourceDocument {
            bytes: b"PK\x03\x04 truncated",
            filename: "broken.xlsx",
        };
        let out = mask_content("SSN 123-45-6789", Some(source), &ActiveCategories::all(), &ExemptionSet::new());
        assert_eq!(out.text, "SSN ***-**-****");
        assert!(out.artifact.is_none());
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].to_string().starts_with("Error parsing Excel"));
    }

    #[test]
    fn test_oversized_entry_is_malformed_not_fatal() {
        let bytes = common::oversized_entry("word/document.xml", b"<w:document/>", 1 << 40);

        let err = extract_text(DocumentFormat::Docx, &bytes, FallbackEncoding::Latin1).unwrap_err();
        assert!(matches!(err, pii_masker::DocumentError::Malformed { format: DocumentFormat::Docx, .. }));

        let source = SourceDocument {
            bytes: &bytes,
            filename: "evil.docx",
        };
        let out = mask_content("mail bob@ex.com", Some(source), &ActiveCategories::all(), &ExemptionSet::new());
        assert_eq!(out.text, "mail ******@***.**");
        assert!(out.artifact.is_none());
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].to_string().starts_with("Error parsing DOCX"));
    }

    #[test]
    fn test_grid_redacts_unreferenced_shared_strings() -> Result<()> {
        let bytes = common::xlsx(
            &["Email: a@b.com", "old note 212-555-0199"],
            &[r#"<c r="A1" t="s"><v>0</v></c>"#],
        );
        let text = extract(DocumentFormat::Xlsx, &bytes)?;
        assert_eq!(text, "Email: a@b.com");

        let source = SourceDocument {
            bytes: &bytes,
            filename: "book.xlsx",
        };
        let out = mask_content(&text, Some(source), &ActiveCategories::all(), &ExemptionSet::new());
        assert_eq!(out.stats.total, 1);

        let strings = common::read_part(&out.artifact.expect("xlsx artifact").bytes, "xl/sharedStrings.xml");
        assert!(!strings.contains("a@b.com"));
        assert!(!strings.contains("212-555-0199"));
        assert!(strings.contains("old note [PHONE-REDACTED]"));
        Ok(())
    }

    #[test]
    fn test_docx_link_addresses_are_redacted() -> Result<()> {
        let bytes = common::linked_docx();
        let text = extract(DocumentFormat::Docx, &bytes)?;
        assert_eq!(text, "Write to bob@ex.com\nor here");

        let source = SourceDocument {
            bytes: &bytes,
            filename: "letter.docx",
        };
        let out = mask_content(&text, Some(source), &ActiveCategories::all(), &ExemptionSet::new());
        assert_eq!(out.stats.email, 1);

        let artifact = out.artifact.expect("docx artifact");
        let body = common::read_part(&artifact.bytes, "word/document.xml");
        let rels = common::read_part(&artifact.bytes, "word/_rels/document.xml.rels");
        assert!(!body.contains("bob@ex.com"));
        assert!(!rels.contains("bob@ex.com"));
        assert!(body.contains("mailto:******@***.**"));
        assert!(rels.contains("mailto:******@***.**"));
        assert!(body.contains(r#"<w:rStyle w:val="Hyperlink"/>"#));
        assert_eq!(common::read_part(&artifact.bytes, "word/styles.xml"), common::STYLES);
        Ok(())
    }

    #[test]
    fn test_docx_exempt_link_is_kept() -> Result<()> {
        let bytes = common::linked_docx();
        let text = extract(DocumentFormat::Docx, &bytes)?;
        let exemptions: ExemptionSet = ["bob@ex.com"].into_iter().collect();
        let source = SourceDocument {
            bytes: &bytes,
            filename: "letter.docx",
        };
        let out = mask_content(&text, Some(source), &ActiveCategories::all(), &exemptions);

        let artifact = out.artifact.expect("docx artifact");
        let rels = common::read_part(&artifact.bytes, "word/_rels/document.xml.rels");
        assert!(rels.contains(r#"Target="mailto:bob@ex.com""#));
        Ok(())
    }
}
