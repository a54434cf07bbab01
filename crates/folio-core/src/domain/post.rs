use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

pub const TITLE_MAX_CHARS: usize = 100;
pub const EXCERPT_MAX_CHARS: usize = 500;
pub const DEFAULT_COVER_IMAGE: &str = "default-cover.jpg";

/// Fixed set of categories a post may be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Food,
    Travel,
    Technology,
    Lifestyle,
    Business,
    Health,
    SocialMedia,
    News,
    International,
    Facts,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Food,
        Category::Travel,
        Category::Technology,
        Category::Lifestyle,
        Category::Business,
        Category::Health,
        Category::SocialMedia,
        Category::News,
        Category::International,
        Category::Facts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Travel => "travel",
            Category::Technology => "technology",
            Category::Lifestyle => "lifestyle",
            Category::Business => "business",
            Category::Health => "health",
            Category::SocialMedia => "social-media",
            Category::News => "news",
            Category::International => "international",
            Category::Facts => "facts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| DomainError::validation(format!("unknown category '{}'", s)))
    }
}

/// Post entity - a blog article owned by its author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image: String,
    pub category: Category,
    pub tags: BTreeSet<String>,
    pub featured: bool,
    pub author_id: Uuid,
    pub like_count: u64,
    pub comment_count: u64,
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a post. The category arrives unparsed so that an
/// out-of-set value is reported as a validation failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

/// Partial update of a post. The slug is kept unless `regenerate_slug` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub regenerate_slug: bool,
}

impl NewPost {
    /// Validate the input and build a post owned by `author_id`.
    pub fn into_post(self, author_id: Uuid) -> DomainResult<Post> {
        let title = validate_title(&self.title)?;
        let excerpt = validate_excerpt(&self.excerpt)?;
        let content = validate_content(&self.content)?;
        let category = self.category.parse()?;
        let slug = slugify(&title);
        if slug.is_empty() {
            return Err(DomainError::validation(
                "title must contain at least one letter or digit",
            ));
        }

        let now = Utc::now();
        Ok(Post {
            id: Uuid::new_v4(),
            title,
            slug,
            excerpt,
            content,
            cover_image: self
                .cover_image
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COVER_IMAGE.to_string()),
            category,
            tags: normalize_tags(self.tags),
            featured: self.featured,
            author_id,
            like_count: 0,
            comment_count: 0,
            view_count: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Post {
    /// Apply a patch in place. Returns `true` when the slug changed.
    pub fn apply_patch(&mut self, patch: PostPatch) -> DomainResult<bool> {
        if let Some(title) = patch.title {
            self.title = validate_title(&title)?;
        }
        if let Some(excerpt) = patch.excerpt {
            self.excerpt = validate_excerpt(&excerpt)?;
        }
        if let Some(content) = patch.content {
            self.content = validate_content(&content)?;
        }
        if let Some(cover) = patch.cover_image {
            self.cover_image = cover;
        }
        if let Some(category) = patch.category {
            self.category = category.parse()?;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(featured) = patch.featured {
            self.featured = featured;
        }

        let mut slug_changed = false;
        if patch.regenerate_slug {
            let slug = slugify(&self.title);
            if slug.is_empty() {
                return Err(DomainError::validation(
                    "title must contain at least one letter or digit",
                ));
            }
            slug_changed = slug != self.slug;
            self.slug = slug;
        }

        self.updated_at = Utc::now();
        Ok(slug_changed)
    }
}

/// Derive a URL slug: lowercase, characters other than letters, digits and
/// spaces dropped, runs of spaces collapsed into a single hyphen.
pub fn slugify(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

fn validate_title(title: &str) -> DomainResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("please add a title"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "title cannot be more than {} characters",
            TITLE_MAX_CHARS
        )));
    }
    Ok(title.to_string())
}

fn validate_excerpt(excerpt: &str) -> DomainResult<String> {
    if excerpt.trim().is_empty() {
        return Err(DomainError::validation("please add an excerpt"));
    }
    if excerpt.chars().count() > EXCERPT_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "excerpt cannot be more than {} characters",
            EXCERPT_MAX_CHARS
        )));
    }
    Ok(excerpt.to_string())
}

fn validate_content(content: &str) -> DomainResult<String> {
    if content.trim().is_empty() {
        return Err(DomainError::validation("please add content"));
    }
    Ok(content.to_string())
}

fn normalize_tags(tags: Vec<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
