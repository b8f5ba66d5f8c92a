//! Sample content for `populate-test-data`.

use serde_json::{json, Value};

/// Rule documents as `(name, file_type, file_size)`; each gets a placeholder file.
pub const RULE_DOCUMENTS: &[(&str, &str, &str)] = &[
    ("Complete Rule Book 2025", "PDF", "2.1 MB"),
    ("Safety Guidelines", "PDF", "1.5 MB"),
    ("Registration Form", "PDF", "856 KB"),
    ("Technical Specifications", "PDF", "3.2 MB"),
];

pub const SPONSORS: &[&str] = &["Sponsor 1", "Sponsor 2", "Sponsor 3", "Sponsor 4"];

fn child(block_type: &str, value: Value) -> Value {
    json!({"type": block_type, "value": value})
}

fn cta(title: &str, description: &str, primary: &str, secondary: Option<&str>) -> Value {
    let mut value = json!({
        "title": title,
        "description": description,
        "primary_button_text": primary,
        "background_style": "gradient",
    });
    if let Some(secondary) = secondary {
        value["secondary_button_text"] = json!(secondary);
    }
    value
}

fn icon_card(icon_name: &str, title: &str, description: &str) -> Value {
    json!({"icon_name": icon_name, "title": title, "description": description})
}

/// HomePage body; `documents` are the ids for the rule document entries, in order.
pub fn home_body(documents: &[i64]) -> Value {
    let heroes = [
        (
            "Welcome to ARC 2025",
            "Annual Robotics Competition",
            "<p>Join us for the most exciting robotics competition in Lebanon!</p>",
            ("Register Now", "#events"),
            ("Become a Volunteer", "#volunteers"),
        ),
        (
            "Innovate. Compete. Excel.",
            "Push the Boundaries of Robotics",
            "<p>Challenge yourself and showcase your robotics skills.</p>",
            ("View Events", "#events"),
            ("Learn More", "#about"),
        ),
        (
            "Join the Future of Robotics",
            "Innovation Meets Excellence",
            "<p>Be part of Lebanon's premier robotics community.</p>",
            ("Get Started", "#events"),
            ("View Gallery", "#gallery"),
        ),
    ];

    let mut body: Vec<Value> = heroes
        .iter()
        .map(|(title, subtitle, description, cta, secondary)| {
            child(
                "hero",
                json!({
                    "title": title,
                    "subtitle": subtitle,
                    "description": description,
                    "cta_text": cta.0,
                    "cta_link": cta.1,
                    "secondary_cta_text": secondary.0,
                    "secondary_cta_link": secondary.1,
                }),
            )
        })
        .collect();

    body.push(child(
        "about_stats",
        json!([
            {"number": "5+", "label": "Years Active"},
            {"number": "1000+", "label": "Participants"},
        ]),
    ));
    body.push(child(
        "value_cards",
        json!([
            icon_card("Target", "Innovation", "Pushing boundaries with cutting-edge robotics technology and creative problem-solving."),
            icon_card("Users", "Community", "Building a supportive network of robotics enthusiasts, mentors, and innovators."),
            icon_card("Trophy", "Excellence", "Striving for the highest standards in competition and technical achievement."),
            icon_card("Lightbulb", "Learning", "Continuous education and skill development in robotics and STEM fields."),
        ]),
    ));

    body.push(child(
        "event_details",
        json!([
            {
                "title": "ARC Championship 2025",
                "date": "March 15-17, 2025",
                "time": "9:00 AM - 6:00 PM",
                "location": "American University of Beirut",
                "participants": "100+ Teams",
                "description": "The main robotics championship featuring multiple competition categories.",
                "status": "Registration Open",
                "status_color": "bg-secondary",
                "button_text": "Learn More",
            },
            {
                "title": "Robotics Workshop",
                "date": "February 20, 2025",
                "time": "10:00 AM - 4:00 PM",
                "location": "Lebanese American University",
                "participants": "50+ Participants",
                "description": "Hands-on workshop covering robot design, programming, and competition strategies.",
                "status": "Coming Soon",
                "status_color": "bg-accent",
                "button_text": "Learn More",
            },
            {
                "title": "Junior Challenge",
                "date": "April 10, 2025",
                "time": "9:00 AM - 3:00 PM",
                "location": "Université Saint-Joseph",
                "participants": "60+ Young Engineers",
                "description": "Special competition category for students aged 12-16.",
                "status": "Registration Opens Soon",
                "status_color": "bg-muted",
                "button_text": "Learn More",
            },
        ]),
    ));
    body.push(child(
        "events_cta",
        cta(
            "Don't Miss Out!",
            "Subscribe to our newsletter for the latest updates, event announcements, and exclusive content.",
            "Subscribe Now",
            None,
        ),
    ));

    body.push(child(
        "volunteer_stats",
        json!([
            {"number": "200+", "label": "Active Volunteers"},
            {"number": "5+", "label": "Years Running"},
        ]),
    ));
    body.push(child(
        "benefit_cards",
        json!([
            icon_card("Users", "Community Impact", "Make a difference by supporting STEM education and inspiring young innovators."),
            icon_card("Heart", "Meaningful Experience", "Gain valuable experience while contributing to a cause you believe in."),
            icon_card("Star", "Skill Development", "Develop leadership, teamwork, and technical skills through hands-on involvement."),
        ]),
    ));
    body.push(child(
        "volunteer_cta",
        cta(
            "Ready to Make a Difference?",
            "Join our team of dedicated volunteers and help shape the future of robotics education.",
            "Join Now",
            None,
        ),
    ));

    body.push(child(
        "rule_categories",
        json!([
            {
                "icon_name": "Trophy",
                "title": "Autonomous Navigation",
                "description": "Robots must navigate through obstacles autonomously without human intervention.",
                "rules": ["Maximum robot size: 30x30x30 cm", "Autonomous operation only", "Time limit: 5 minutes"],
            },
            {
                "icon_name": "Users",
                "title": "Robot Soccer",
                "description": "Teams of robots compete in an exciting soccer match.",
                "rules": ["Team size: 3-5 robots", "Match duration: 2x5 minutes", "Ball detection required"],
            },
            {
                "icon_name": "Settings",
                "title": "Line Following",
                "description": "Robots follow a black line on white surface at maximum speed.",
                "rules": ["Single robot per team", "Must follow black line", "Speed and accuracy both count"],
            },
            {
                "icon_name": "Shield",
                "title": "Sumo Wrestling",
                "description": "Robots push each other out of a circular ring.",
                "rules": ["Weight limit: 3 kg", "Ring diameter: 154 cm", "Best of 3 matches"],
            },
        ]),
    ));
    body.push(child(
        "general_rules",
        json!([
            "All teams must register by the deadline",
            "Robots must pass safety inspection before competing",
            "Teams can participate in multiple categories",
            "Fair play and sportsmanship are mandatory",
            "Protests must be filed within 15 minutes",
            "Judges' decisions are final",
        ]),
    ));
    let rule_documents: Vec<Value> = RULE_DOCUMENTS
        .iter()
        .zip(documents)
        .map(|((name, file_type, file_size), id)| {
            json!({"name": name, "document": id, "file_type": file_type, "file_size": file_size})
        })
        .collect();
    body.push(child("rule_documents", Value::Array(rule_documents)));
    body.push(child(
        "rules_faq_cta",
        cta(
            "Have Questions?",
            "Check our FAQ or contact our technical support team for clarification on any rules.",
            "View FAQ",
            Some("Contact Technical Support"),
        ),
    ));

    body.push(child(
        "organizers",
        json!([
            {"name": "Kalimat", "description": "Leading educational technology company supporting robotics education", "role": "Main Sponsor"},
            {"name": "Teachers Association", "description": "Professional organization of educators promoting STEM education", "role": "Educational Partner"},
            {"name": "Technical Committee", "description": "Expert panel ensuring fair competition and technical excellence", "role": "Technical Oversight"},
            {"name": "University Partners", "description": "Academic institutions providing venue and technical support", "role": "Academic Partners"},
        ]),
    ));
    body.push(child(
        "organizer_stats",
        json!([
            {"icon_name": "Building2", "number": "15+", "label": "Partner Organizations"},
            {"icon_name": "Users", "number": "50+", "label": "Expert Volunteers"},
            {"icon_name": "Award", "number": "5+", "label": "Years Experience"},
            {"icon_name": "Globe", "number": "3", "label": "Countries Represented"},
        ]),
    ));
    body.push(child(
        "organizers_cta",
        cta(
            "Join Our Network",
            "Are you an organization passionate about robotics education? We're always looking for new partners to help us expand our impact.",
            "Become a Partner",
            Some("Learn More"),
        ),
    ));

    Value::Array(body)
}

/// Site settings changes; `sponsor_logos` are image ids, one per sponsor.
pub fn site_settings(sponsor_logos: &[i64]) -> Value {
    let sponsors: Vec<Value> = SPONSORS
        .iter()
        .zip(sponsor_logos)
        .map(|(name, logo)| child("sponsor", json!({"name": name, "logo": logo})))
        .collect();

    json!({
        "site_name": "ARC Lebanon",
        "site_tagline": "Annual Robotics Competition",
        "site_description": "Empowering the next generation of robotics innovators through competition, education, and community building.",
        "copyright_text": "(c) 2025 ARC Lebanon. All rights reserved.",
        "footer_about_text": "ARC Lebanon is the premier robotics competition in the region, bringing together students, educators, and technology enthusiasts.",
        "login_button_text": "Login / Register",
        "contact_info": [
            child("contact", json!({"icon_name": "MapPin", "label": "Location", "value": "Beirut, Lebanon"})),
            child("contact", json!({"icon_name": "Phone", "label": "Phone", "value": "+961 1 234 567"})),
            child("contact", json!({"icon_name": "Mail", "label": "Email", "value": "info@arc-robotics.com"})),
            child("contact", json!({"icon_name": "Globe", "label": "Website", "value": "www.arc-robotics.com"})),
        ],
        "social_links": [
            child("social_link", json!({"name": "LinkedIn", "url": "https://linkedin.com/company/arc-lebanon", "icon_name": "Linkedin"})),
            child("social_link", json!({"name": "Twitter", "url": "https://twitter.com/arc_lebanon", "icon_name": "Twitter"})),
            child("social_link", json!({"name": "Instagram", "url": "https://instagram.com/arc_lebanon", "icon_name": "Instagram"})),
        ],
        "sponsors": sponsors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaRefs;
    use crate::pages::{settings, PageType};

    #[test]
    fn test_home_body_passes_validation() {
        let content = PageType::Home
            .clean_content(json!({"hero_title": "Welcome to ARC", "body": home_body(&[1, 2, 3, 4])}))
            .unwrap();

        let body = content["body"].as_array().unwrap();
        assert_eq!(body.len(), 17);
        assert_eq!(body[0]["type"], "hero");
        assert!(body.iter().all(|child| child["id"].is_string()));

        let mut refs = MediaRefs::default();
        PageType::Home.schema().collect_media(&content, &mut refs);
        assert_eq!(refs.documents.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rule_documents_need_a_document() {
        let mut errors = Vec::new();
        PageType::Home.schema().validate(
            &json!({"body": [{"type": "rule_documents", "value": [{"name": "Rules"}]}]}),
            "",
            &mut errors,
        );
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_site_settings_pass_validation() {
        let updated =
            settings::apply_changes(&settings::default_content(), site_settings(&[7, 8, 9, 10]))
                .unwrap();
        assert_eq!(updated["sponsors"].as_array().unwrap().len(), 4);
        assert_eq!(updated["contact_info"][0]["value"]["label"], "Location");
        assert_eq!(updated["show_login_button"], true);
    }
}
