//! Section imagery: generated images when a capable provider exists, otherwise
//! a deterministic pick from a keyword-matched stock catalog.

use letterpress_shared::{ImagePlacement, ImageRef, ImageSource, Provider};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::context::JobContext;
use crate::executor::try_providers;

struct Catalog {
    keywords: &'static [&'static str],
    seeds: &'static [&'static str],
}

const CATALOGS: &[Catalog] = &[
    Catalog {
        keywords: &["ai", "artificial", "machine", "software", "tech", "data", "cloud", "robot", "digital"],
        seeds: &["circuit-board", "server-room", "code-screen", "neural-lights", "robot-arm"],
    },
    Catalog {
        keywords: &["health", "medical", "patient", "hospital", "clinic", "care", "wellness"],
        seeds: &["stethoscope", "clinic-hall", "lab-bench", "care-team", "pharmacy-shelf"],
    },
    Catalog {
        keywords: &["finance", "money", "market", "invest", "budget", "bank", "economy"],
        seeds: &["trading-floor", "coin-stack", "city-skyline", "ledger-desk"],
    },
    Catalog {
        keywords: &["climate", "energy", "green", "environment", "solar", "sustainab", "nature"],
        seeds: &["solar-field", "wind-farm", "forest-canopy", "river-delta"],
    },
    Catalog {
        keywords: &["school", "education", "learning", "student", "teach", "training"],
        seeds: &["lecture-hall", "library-stacks", "notebook-desk", "chalkboard"],
    },
];

const DEFAULT_SEEDS: &[&str] = &["open-workspace", "morning-coffee", "team-meeting", "city-street", "notebook"];

fn seeds_for(text: &str) -> &'static [&'static str] {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).collect();
    CATALOGS
        .iter()
        .find(|c| {
            c.keywords
                .iter()
                .any(|k| words.iter().any(|w| w.starts_with(k)))
        })
        .map_or(DEFAULT_SEEDS, |c| c.seeds)
}

/// Pick a stock image for a section. The same `(topic, title)` always yields
/// the same image.
pub fn stock_image(topic: &str, title: &str) -> ImageRef {
    let seeds = seeds_for(&format!("{topic} {title}"));
    let digest = Sha256::digest(format!("{topic}\u{1f}{title}").as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let index = (u64::from_be_bytes(head) % seeds.len() as u64) as usize;

    ImageRef {
        url: format!("https://picsum.photos/seed/{}/1200/630", seeds[index]),
        alt: title.to_string(),
        source: ImageSource::Web,
    }
}

/// The image for section `index`, if the job asked for one at that position.
pub async fn attach_image(ctx: &JobContext, title: &str, index: usize) -> Option<ImageRef> {
    let images = ctx.options.images?;
    if images.placement == ImagePlacement::Header && index > 0 {
        return None;
    }

    if images.source == ImageSource::Ai {
        if let Some(image) = generate_image(ctx, title).await {
            return Some(image);
        }
    }
    Some(stock_image(ctx.topic(), title))
}

async fn generate_image(ctx: &JobContext, title: &str) -> Option<ImageRef> {
    let capable: Vec<Provider> = ctx
        .providers
        .generation
        .iter()
        .filter(|p| ctx.registry.supports_images(p.kind))
        .cloned()
        .collect();
    if capable.is_empty() {
        debug!("no image-capable provider, using stock imagery");
        return None;
    }

    let prompt = format!(
        "Editorial illustration for a newsletter section titled \"{title}\" about {topic}. \
         Clean, modern, no text or lettering.",
        topic = ctx.topic()
    );
    let registry = &ctx.registry;
    let prompt = prompt.as_str();

    match try_providers(&capable, "image", |provider| async move {
        registry.generate_image(provider, prompt).await
    })
    .await
    {
        Ok(success) => Some(ImageRef {
            url: success.value,
            alt: title.to_string(),
            source: ImageSource::Ai,
        }),
        Err(e) => {
            warn!(error = %e, "image generation failed, using stock imagery");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{FakeAdapter, context};
    use letterpress_shared::ImageOptions;

    #[test]
    fn stock_pick_is_deterministic() {
        let a = stock_image("AI in Healthcare", "Triage gets a second opinion");
        let b = stock_image("AI in Healthcare", "Triage gets a second opinion");
        assert_eq!(a, b);
        assert_eq!(a.source, ImageSource::Web);
        assert!(a.url.starts_with("https://picsum.photos/seed/"));
    }

    #[test]
    fn catalog_follows_keywords() {
        let health = stock_image("Hospital staffing", "Night shifts");
        let seed = health.url.split('/').nth(4).unwrap_or_default().to_string();
        assert!(CATALOGS[1].seeds.contains(&seed.as_str()));

        let other = stock_image("Gardening", "Spring bulbs");
        let seed = other.url.split('/').nth(4).unwrap_or_default().to_string();
        assert!(DEFAULT_SEEDS.contains(&seed.as_str()));
    }

    #[tokio::test]
    async fn header_placement_only_first_section() {
        let mut ctx = context(FakeAdapter::healthy(), 3);
        ctx.options.images = Some(ImageOptions {
            source: ImageSource::Web,
            placement: ImagePlacement::Header,
        });
        assert!(attach_image(&ctx, "First", 0).await.is_some());
        assert!(attach_image(&ctx, "Second", 1).await.is_none());
    }

    #[tokio::test]
    async fn ai_source_without_capable_provider_uses_stock() {
        let mut ctx = context(FakeAdapter::healthy(), 3);
        ctx.options.images = Some(ImageOptions {
            source: ImageSource::Ai,
            placement: ImagePlacement::All,
        });
        let image = attach_image(&ctx, "Paperwork, automated", 1).await.expect("image");
        assert_eq!(image.source, ImageSource::Web);
    }

    #[tokio::test]
    async fn no_image_options_means_no_image() {
        let ctx = context(FakeAdapter::healthy(), 3);
        assert!(attach_image(&ctx, "Anything", 0).await.is_none());
    }
}
