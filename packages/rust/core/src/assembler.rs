//! Final document assembler.
//!
//! Merges the plan header, sanitized sections, and brand metadata into the
//! immutable [`FinalDocument`] written to the job at terminal success.

use chrono::NaiveDate;
use letterpress_shared::{
    BrandConfig, ContentPlan, DocumentFooter, DocumentHeader, FinalDocument, FooterLink, Section,
};

/// Brand name used when `[brand].name` is not configured.
pub const DEFAULT_BRAND_NAME: &str = "Letterpress";

/// Build the final document. Sections are taken as-is and may be fewer than
/// the plan requested.
pub fn assemble(
    plan: &ContentPlan,
    sections: Vec<Section>,
    brand: &BrandConfig,
    date: NaiveDate,
) -> FinalDocument {
    let brand_name = brand
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BRAND_NAME.to_string());

    let footer_text = brand
        .footer_text
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| {
            format!("You are receiving this newsletter from {brand_name}. Thanks for reading.")
        });

    FinalDocument {
        header: DocumentHeader {
            title: plan.title.clone(),
            subtitle: plan.subtitle.clone(),
            date,
            logo_url: brand.logo_url.clone().filter(|u| !u.trim().is_empty()),
            brand_name: Some(brand_name),
        },
        sections,
        footer: DocumentFooter {
            text: footer_text,
            links: brand
                .links
                .iter()
                .map(|l| FooterLink {
                    label: l.label.clone(),
                    url: l.url.clone(),
                })
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterpress_shared::FooterLinkConfig;

    fn plan() -> ContentPlan {
        ContentPlan {
            title: "Five Ways AI Is Quietly Rewiring Patient Care".into(),
            subtitle: "What clinics are learning".into(),
            sections: Vec::new(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("date")
    }

    #[test]
    fn defaults_apply_without_brand() {
        let doc = assemble(&plan(), Vec::new(), &BrandConfig::default(), date());
        assert_eq!(doc.header.title, "Five Ways AI Is Quietly Rewiring Patient Care");
        assert_eq!(doc.header.brand_name.as_deref(), Some(DEFAULT_BRAND_NAME));
        assert_eq!(doc.header.logo_url, None);
        assert!(doc.footer.text.contains(DEFAULT_BRAND_NAME));
        assert!(doc.footer.links.is_empty());
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn brand_overrides_defaults() {
        let brand = BrandConfig {
            name: Some("Acme Health".into()),
            logo_url: Some("https://acme.test/logo.png".into()),
            footer_text: Some("Acme Health, 1 Main St.".into()),
            links: vec![FooterLinkConfig {
                label: "Unsubscribe".into(),
                url: "https://acme.test/unsub".into(),
            }],
        };
        let doc = assemble(&plan(), Vec::new(), &brand, date());
        assert_eq!(doc.header.brand_name.as_deref(), Some("Acme Health"));
        assert_eq!(doc.header.logo_url.as_deref(), Some("https://acme.test/logo.png"));
        assert_eq!(doc.footer.text, "Acme Health, 1 Main St.");
        assert_eq!(doc.footer.links[0].label, "Unsubscribe");
        assert_eq!(doc.header.date, date());
    }
}
