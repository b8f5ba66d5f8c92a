//! Struct blocks shared by page bodies and site settings.

use super::BlockDef;

pub const STATUS_COLORS: &[&str] = &["bg-secondary", "bg-accent", "bg-muted"];
pub const BACKGROUND_STYLES: &[&str] = &["gradient", "solid", "transparent"];

pub fn hero() -> BlockDef {
    BlockDef::structure(
        "HeroBlock",
        vec![
            ("title", BlockDef::char(255)),
            ("subtitle", BlockDef::char(255).optional()),
            ("description", BlockDef::rich_text().optional()),
            ("background_image", BlockDef::image().optional()),
            ("cta_text", BlockDef::char(100).optional()),
            ("cta_link", BlockDef::url().optional()),
            ("secondary_cta_text", BlockDef::char(100).optional()),
            ("secondary_cta_link", BlockDef::url().optional()),
        ],
    )
}

pub fn about() -> BlockDef {
    BlockDef::structure(
        "AboutBlock",
        vec![
            ("title", BlockDef::char(255)),
            ("content", BlockDef::rich_text()),
            ("image", BlockDef::image().optional()),
        ],
    )
}

pub fn event() -> BlockDef {
    BlockDef::structure(
        "EventBlock",
        vec![
            ("title", BlockDef::char(255)),
            ("date", BlockDef::date().optional()),
            ("time", BlockDef::time().optional()),
            ("location", BlockDef::char(255).optional()),
            ("description", BlockDef::rich_text().optional()),
            ("image", BlockDef::image().optional()),
            ("registration_link", BlockDef::url().optional()),
        ],
    )
}

pub fn gallery_image() -> BlockDef {
    BlockDef::structure(
        "GalleryImageBlock",
        vec![
            ("image", BlockDef::image()),
            ("caption", BlockDef::char(255).optional()),
        ],
    )
}

pub fn youtube_video() -> BlockDef {
    BlockDef::structure(
        "YouTubeVideoBlock",
        vec![
            ("title", BlockDef::char(255)),
            ("youtube_url", BlockDef::url()),
            ("thumbnail", BlockDef::image().optional()),
            ("description", BlockDef::text().optional()),
        ],
    )
}

pub fn testimonial() -> BlockDef {
    BlockDef::structure(
        "TestimonialBlock",
        vec![
            ("quote", BlockDef::text()),
            ("author", BlockDef::char(100)),
            ("role", BlockDef::char(150).optional()),
            ("avatar", BlockDef::image().optional()),
        ],
    )
}

pub fn team_member() -> BlockDef {
    BlockDef::structure(
        "TeamMemberBlock",
        vec![
            ("name", BlockDef::char(100)),
            ("role", BlockDef::char(150)),
            ("bio", BlockDef::text().optional()),
            ("photo", BlockDef::image().optional()),
            ("email", BlockDef::email().optional()),
            ("phone", BlockDef::char(50).optional()),
        ],
    )
}

pub fn rule() -> BlockDef {
    BlockDef::structure(
        "RuleBlock",
        vec![
            ("rule_number", BlockDef::char(10).optional()),
            ("title", BlockDef::char(255)),
            ("description", BlockDef::rich_text()),
        ],
    )
}

pub fn stat() -> BlockDef {
    BlockDef::structure(
        "StatBlock",
        vec![
            ("number", BlockDef::char(50)),
            ("label", BlockDef::char(100)),
        ],
    )
}

/// Icon, title and description card. Value and benefit cards share this shape.
fn icon_card(name: &'static str) -> BlockDef {
    BlockDef::structure(
        name,
        vec![
            ("icon_name", BlockDef::char(50)),
            ("title", BlockDef::char(100)),
            ("description", BlockDef::text()),
        ],
    )
}

pub fn value_card() -> BlockDef {
    icon_card("ValueCardBlock")
}

pub fn benefit_card() -> BlockDef {
    icon_card("BenefitCardBlock")
}

pub fn competition_category() -> BlockDef {
    BlockDef::structure(
        "CompetitionCategoryBlock",
        vec![("name", BlockDef::char(100))],
    )
}

pub fn event_detail() -> BlockDef {
    BlockDef::structure(
        "EventDetailBlock",
        vec![
            ("title", BlockDef::char(255)),
            ("date", BlockDef::char(100)),
            ("time", BlockDef::char(100)),
            ("location", BlockDef::char(255)),
            ("participants", BlockDef::char(100)),
            ("description", BlockDef::text()),
            ("status", BlockDef::char(50)),
            (
                "status_color",
                BlockDef::choice(STATUS_COLORS).with_default("bg-secondary"),
            ),
            ("button_text", BlockDef::char(50).with_default("Learn More")),
            ("button_link", BlockDef::url().optional()),
            ("image", BlockDef::image().optional()),
        ],
    )
}

pub fn rule_category() -> BlockDef {
    BlockDef::structure(
        "RuleCategoryBlock",
        vec![
            ("icon_name", BlockDef::char(50)),
            ("title", BlockDef::char(100)),
            ("description", BlockDef::text()),
            ("rules", BlockDef::list(BlockDef::char(255))),
        ],
    )
}

pub fn rule_document() -> BlockDef {
    BlockDef::structure(
        "RuleDocumentBlock",
        vec![
            ("name", BlockDef::char(255)),
            ("document", BlockDef::document()),
            ("description", BlockDef::text().optional()),
            ("file_type", BlockDef::char(20).optional()),
            ("file_size", BlockDef::char(20).optional()),
        ],
    )
}

pub fn organizer() -> BlockDef {
    BlockDef::structure(
        "OrganizerBlock",
        vec![
            ("name", BlockDef::char(100)),
            ("logo", BlockDef::image().optional()),
            ("description", BlockDef::text()),
            ("role", BlockDef::char(100)),
        ],
    )
}

pub fn organizer_stat() -> BlockDef {
    BlockDef::structure(
        "OrganizerStatBlock",
        vec![
            ("icon_name", BlockDef::char(50)),
            ("number", BlockDef::char(50)),
            ("label", BlockDef::char(100)),
        ],
    )
}

pub fn sponsor() -> BlockDef {
    BlockDef::structure(
        "SponsorBlock",
        vec![
            ("name", BlockDef::char(100)),
            ("logo", BlockDef::image()),
            ("website", BlockDef::url().optional()),
        ],
    )
}

pub fn contact_info() -> BlockDef {
    BlockDef::structure(
        "ContactInfoBlock",
        vec![
            ("icon_name", BlockDef::char(50)),
            ("label", BlockDef::char(100)),
            ("value", BlockDef::char(255)),
        ],
    )
}

pub fn social_link() -> BlockDef {
    BlockDef::structure(
        "SocialLinkBlock",
        vec![
            ("name", BlockDef::char(50)),
            ("url", BlockDef::url()),
            ("icon_name", BlockDef::char(50).optional()),
        ],
    )
}

pub fn navigation_item() -> BlockDef {
    BlockDef::structure(
        "NavigationItemBlock",
        vec![
            ("label", BlockDef::char(100)),
            ("section_id", BlockDef::char(100)),
            ("order", BlockDef::integer().with_int_default(0)),
        ],
    )
}

pub fn cta() -> BlockDef {
    BlockDef::structure(
        "CTABlock",
        vec![
            ("title", BlockDef::char(255)),
            ("description", BlockDef::text().optional()),
            ("primary_button_text", BlockDef::char(100)),
            ("primary_button_link", BlockDef::url().optional()),
            ("secondary_button_text", BlockDef::char(100).optional()),
            ("secondary_button_link", BlockDef::url().optional()),
            (
                "background_style",
                BlockDef::choice(BACKGROUND_STYLES).with_default("gradient"),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::clean;
    use serde_json::json;

    #[test]
    fn test_event_detail_defaults() {
        let value = clean(
            &event_detail(),
            json!({
                "title": "ARC 2025 National Finals",
                "date": "May 17, 2025",
                "time": "9:00 AM - 6:00 PM",
                "location": "Beirut Digital District",
                "participants": "100+ Teams",
                "description": "The biggest robotics event of the year.",
                "status": "Registration Open"
            }),
            "event",
        )
        .unwrap();
        assert_eq!(value["status_color"], "bg-secondary");
        assert_eq!(value["button_text"], "Learn More");
        assert_eq!(value["image"], serde_json::Value::Null);
    }

    #[test]
    fn test_cta_rejects_unknown_background() {
        let err = clean(
            &cta(),
            json!({"title": "Join", "primary_button_text": "Go", "background_style": "neon"}),
            "cta",
        )
        .unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert_eq!(err.0[0].path, "cta.background_style");
    }

    #[test]
    fn test_sponsor_requires_logo() {
        let err = clean(&sponsor(), json!({"name": "Acme"}), "sponsor").unwrap_err();
        assert_eq!(err.0[0].path, "sponsor.logo");
        assert!(clean(&sponsor(), json!({"name": "Acme", "logo": 4}), "sponsor").is_ok());
    }

    #[test]
    fn test_rule_category_rule_lengths() {
        let long = "x".repeat(256);
        let err = clean(
            &rule_category(),
            json!({"icon_name": "Trophy", "title": "Scoring", "description": "d", "rules": ["ok", long]}),
            "category",
        )
        .unwrap_err();
        assert_eq!(err.0[0].path, "category.rules[1]");
    }

    #[test]
    fn test_competition_category_name_length() {
        assert!(clean(&competition_category(), json!({"name": "x".repeat(100)}), "category").is_ok());
        let err = clean(&competition_category(), json!({"name": "x".repeat(101)}), "category")
            .unwrap_err();
        assert_eq!(err.0[0].path, "category.name");
    }
}
