//! Page types and their content schemas.

pub mod settings;
pub mod tree;

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::blocks::library as lib;
use crate::blocks::{clean, BlockDef, InvalidContent, ValidationError};
use crate::media::rendition;

lazy_static! {
    static ref SLUG_RE: Regex = Regex::new(r"^[-\w]+$").unwrap();
    static ref NON_SLUG_RE: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref DASHES_RE: Regex = Regex::new(r"[-\s]+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    /// Tree root, carries no content
    Root,
    Home,
    About,
    Events,
    Gallery,
    Volunteer,
    Rules,
    Flexible,
}

impl PageType {
    pub const ALL: [PageType; 8] = [
        PageType::Root,
        PageType::Home,
        PageType::About,
        PageType::Events,
        PageType::Gallery,
        PageType::Volunteer,
        PageType::Rules,
        PageType::Flexible,
    ];

    /// `app_label.Model` name exposed through the API and stored on each page.
    pub fn api_type(self) -> &'static str {
        match self {
            PageType::Root => "wagtailcore.Page",
            PageType::Home => "cms_app.HomePage",
            PageType::About => "cms_app.AboutPage",
            PageType::Events => "cms_app.EventsPage",
            PageType::Gallery => "cms_app.GalleryPage",
            PageType::Volunteer => "cms_app.VolunteerPage",
            PageType::Rules => "cms_app.RulesPage",
            PageType::Flexible => "cms_app.FlexiblePage",
        }
    }

    pub fn show_in_menus_default(self) -> bool {
        !matches!(self, PageType::Root)
    }

    /// Struct schema of the type-specific fields, in API order.
    pub fn schema(self) -> &'static BlockDef {
        match self {
            PageType::Root => &*ROOT_PAGE,
            PageType::Home => &*HOME_PAGE,
            PageType::About => &*ABOUT_PAGE,
            PageType::Events => &*EVENTS_PAGE,
            PageType::Gallery => &*GALLERY_PAGE,
            PageType::Volunteer => &*VOLUNTEER_PAGE,
            PageType::Rules => &*RULES_PAGE,
            PageType::Flexible => &*FLEXIBLE_PAGE,
        }
    }

    /// Names of the type-specific API fields.
    pub fn field_names(self) -> Vec<&'static str> {
        match self.schema() {
            BlockDef::Struct(def) => def.fields.iter().map(|(name, _)| *name).collect(),
            _ => Vec::new(),
        }
    }

    /// Validate and normalize type-specific content before it is stored.
    pub fn clean_content(self, fields: Value) -> Result<Value, InvalidContent> {
        clean(self.schema(), fields, "")
    }

    /// Content with every field at its default.
    pub fn default_content(self) -> Value {
        self.schema().normalize(Value::Null)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_type())
    }
}

impl FromStr for PageType {
    type Err = String;

    /// Model names match case-insensitively, like `?type=cms_app.homepage`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageType::ALL
            .into_iter()
            .find(|t| t.api_type().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("type doesn't exist: {}", s))
    }
}

/// Slugs are letters, digits, underscores and hyphens.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(ValidationError {
            path: "slug".into(),
            message: "Enter a valid slug consisting of letters, numbers, underscores or hyphens."
                .into(),
        })
    }
}

/// Lowercase, strip punctuation, collapse whitespace and dashes into single hyphens.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_SLUG_RE.replace_all(&lowered, "");
    DASHES_RE
        .replace_all(stripped.trim(), "-")
        .trim_matches(['-', '_'])
        .to_string()
}

static ROOT_PAGE: Lazy<BlockDef> = Lazy::new(|| BlockDef::structure("Page", vec![]));

static HOME_PAGE: Lazy<BlockDef> = Lazy::new(|| {
    BlockDef::structure(
        "HomePage",
        vec![
            (
                "hero_title",
                BlockDef::char(255).with_default("Welcome to ARC"),
            ),
            ("hero_subtitle", BlockDef::char(255).optional()),
            (
                "hero_background",
                BlockDef::image().optional().with_rendition(rendition::HERO),
            ),
            (
                "body",
                BlockDef::stream(vec![
                    ("hero", lib::hero()),
                    ("about", lib::about()),
                    ("about_stats", BlockDef::list(lib::stat())),
                    ("value_cards", BlockDef::list(lib::value_card())),
                    ("event_details", BlockDef::list(lib::event_detail())),
                    ("events_cta", lib::cta()),
                    ("volunteer_image", lib::gallery_image()),
                    ("volunteer_stats", BlockDef::list(lib::stat())),
                    ("benefit_cards", BlockDef::list(lib::benefit_card())),
                    ("volunteer_cta", lib::cta()),
                    ("gallery", BlockDef::list(lib::gallery_image())),
                    ("youtube_videos", BlockDef::list(lib::youtube_video())),
                    ("rule_categories", BlockDef::list(lib::rule_category())),
                    ("general_rules", BlockDef::list(BlockDef::char(255))),
                    ("rule_documents", BlockDef::list(lib::rule_document())),
                    ("rules_faq_cta", lib::cta()),
                    ("organizers", BlockDef::list(lib::organizer())),
                    ("organizer_stats", BlockDef::list(lib::organizer_stat())),
                    ("organizers_cta", lib::cta()),
                    ("testimonials", BlockDef::list(lib::testimonial())),
                    ("team", BlockDef::list(lib::team_member())),
                    ("rules", BlockDef::list(lib::rule())),
                    ("events", BlockDef::list(lib::event())),
                    ("cta", lib::cta()),
                    ("rich_text", BlockDef::rich_text()),
                    ("html", BlockDef::raw_html()),
                ])
                .optional(),
            ),
        ],
    )
});

static ABOUT_PAGE: Lazy<BlockDef> = Lazy::new(|| {
    BlockDef::structure(
        "AboutPage",
        vec![
            ("intro", BlockDef::rich_text().optional()),
            ("mission", BlockDef::rich_text().optional()),
            ("vision", BlockDef::rich_text().optional()),
            (
                "body",
                BlockDef::stream(vec![
                    ("about", lib::about()),
                    ("team", BlockDef::list(lib::team_member())),
                    ("testimonials", BlockDef::list(lib::testimonial())),
                    ("rich_text", BlockDef::rich_text()),
                ])
                .optional(),
            ),
        ],
    )
});

static EVENTS_PAGE: Lazy<BlockDef> = Lazy::new(|| {
    BlockDef::structure(
        "EventsPage",
        vec![
            ("intro", BlockDef::rich_text().optional()),
            (
                "body",
                BlockDef::stream(vec![
                    ("events", BlockDef::list(lib::event())),
                    ("rich_text", BlockDef::rich_text()),
                ])
                .optional(),
            ),
        ],
    )
});

static GALLERY_PAGE: Lazy<BlockDef> = Lazy::new(|| {
    BlockDef::structure(
        "GalleryPage",
        vec![
            ("intro", BlockDef::rich_text().optional()),
            (
                "body",
                BlockDef::stream(vec![
                    ("gallery", BlockDef::list(lib::gallery_image())),
                    ("rich_text", BlockDef::rich_text()),
                ])
                .optional(),
            ),
        ],
    )
});

static VOLUNTEER_PAGE: Lazy<BlockDef> = Lazy::new(|| {
    BlockDef::structure(
        "VolunteerPage",
        vec![
            ("intro", BlockDef::rich_text().optional()),
            ("requirements", BlockDef::rich_text().optional()),
            ("registration_form_url", BlockDef::url().optional()),
            (
                "body",
                BlockDef::stream(vec![
                    ("rich_text", BlockDef::rich_text()),
                    ("testimonials", BlockDef::list(lib::testimonial())),
                ])
                .optional(),
            ),
        ],
    )
});

static RULES_PAGE: Lazy<BlockDef> = Lazy::new(|| {
    BlockDef::structure(
        "RulesPage",
        vec![
            ("intro", BlockDef::rich_text().optional()),
            (
                "body",
                BlockDef::stream(vec![
                    ("rules", BlockDef::list(lib::rule())),
                    ("rich_text", BlockDef::rich_text()),
                ])
                .optional(),
            ),
        ],
    )
});

static FLEXIBLE_PAGE: Lazy<BlockDef> = Lazy::new(|| {
    BlockDef::structure(
        "FlexiblePage",
        vec![(
            "body",
            BlockDef::stream(vec![
                ("hero", lib::hero()),
                ("about", lib::about()),
                ("events", BlockDef::list(lib::event())),
                ("gallery", BlockDef::list(lib::gallery_image())),
                ("testimonials", BlockDef::list(lib::testimonial())),
                ("team", BlockDef::list(lib::team_member())),
                ("rules", BlockDef::list(lib::rule())),
                ("rich_text", BlockDef::rich_text()),
                ("html", BlockDef::raw_html()),
            ]),
        )],
    )
});

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_type_round_trip() {
        for t in PageType::ALL {
            assert_eq!(t.api_type().parse::<PageType>().unwrap(), t);
        }
        assert_eq!("cms_app.homepage".parse::<PageType>().unwrap(), PageType::Home);
        assert!("cms_app.BlogPage".parse::<PageType>().is_err());
    }

    #[test]
    fn test_field_names_follow_api_order() {
        assert_eq!(
            PageType::Home.field_names(),
            vec!["hero_title", "hero_subtitle", "hero_background", "body"]
        );
        assert_eq!(
            PageType::Volunteer.field_names(),
            vec!["intro", "requirements", "registration_form_url", "body"]
        );
        assert!(PageType::Root.field_names().is_empty());
    }

    #[test]
    fn test_home_page_defaults() {
        let content = PageType::Home.default_content();
        assert_eq!(
            content,
            json!({"hero_title": "Welcome to ARC", "hero_subtitle": "", "hero_background": null, "body": []})
        );
    }

    #[test]
    fn test_flexible_page_requires_body() {
        let err = PageType::Flexible.clean_content(json!({})).unwrap_err();
        assert_eq!(err.0[0].path, "body");

        let ok = PageType::Flexible
            .clean_content(json!({"body": [{"type": "rich_text", "value": "<p>Hi</p>"}]}))
            .unwrap();
        assert!(ok["body"][0]["id"].is_string());
    }

    #[test]
    fn test_home_page_body_validation() {
        let err = PageType::Home
            .clean_content(json!({
                "body": [{"type": "events_cta", "value": {"title": "Join", "primary_button_text": "Go", "primary_button_link": "nope"}}]
            }))
            .unwrap_err();
        assert_eq!(err.0[0].to_string(), "body[0].primary_button_link: Enter a valid URL.");
    }

    #[test]
    fn test_slugs() {
        assert_eq!(slugify("About ARC!"), "about-arc");
        assert_eq!(slugify("  Rules & Guidelines  "), "rules-guidelines");
        assert!(validate_slug("volunteer_2025").is_ok());
        assert!(validate_slug("bad slug").is_err());
        assert!(validate_slug("").is_err());
    }
}
