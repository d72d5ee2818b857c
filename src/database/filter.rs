use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::schema::Uuid;

/// Page-based pagination parameters: `page` (1-based) and `limit`
/// (page size, default 6, clamped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageQuery {
    pub fn parse(query: &str) -> Self {
        let mut this = Self::default();
        for (key, value) in parse_pairs(query) {
            match key.as_str() {
                "page" => {
                    if let Ok(page) = value.parse::<i64>() {
                        this.page = page.max(1);
                    }
                }
                "limit" => {
                    if let Ok(limit) = value.parse::<i64>() {
                        this.limit = limit.clamp(1, MAX_PAGE_SIZE);
                    }
                }
                _ => {}
            }
        }
        this
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Recipe listing filters. `tags` is repeatable (ANY-of by slug);
/// the two boolean flags only take effect for authenticated callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub page: PageQuery,
}

impl RecipeFilter {
    pub fn parse(query: &str) -> Self {
        let mut this = Self {
            page: PageQuery::parse(query),
            ..Self::default()
        };
        for (key, value) in parse_pairs(query) {
            match key.as_str() {
                "tags" => this.tags.push(value),
                "author" => this.author = value.parse::<Uuid>().ok(),
                "is_favorited" => this.is_favorited = parse_bool(&value),
                "is_in_shopping_cart" => this.is_in_shopping_cart = parse_bool(&value),
                _ => {}
            }
        }
        this
    }
}

/// Ingredient search: name prefix via the `name` query parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientFilter {
    pub name: Option<String>,
}

impl IngredientFilter {
    pub fn parse(query: &str) -> Self {
        let mut this = Self::default();
        for (key, value) in parse_pairs(query) {
            if key == "name" && !value.is_empty() {
                this.name = Some(value);
            }
        }
        this
    }
}

/// Query parameters of the subscription endpoints: pagination plus the
/// optional cap on embedded recipes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionQuery {
    pub recipes_limit: Option<i64>,
    pub page: PageQuery,
}

impl SubscriptionQuery {
    pub fn parse(query: &str) -> Self {
        let mut this = Self {
            page: PageQuery::parse(query),
            ..Self::default()
        };
        for (key, value) in parse_pairs(query) {
            if key == "recipes_limit" {
                this.recipes_limit = value.parse::<i64>().ok().filter(|limit| *limit >= 0);
            }
        }
        this
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true")
}

fn parse_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_tags() {
        let filter = RecipeFilter::parse("tags=breakfast&tags=dinner&author=3");
        assert_eq!(filter.tags, vec!["breakfast", "dinner"]);
        assert_eq!(filter.author, Some(3));
        assert!(!filter.is_favorited);
    }

    #[test]
    fn parses_boolean_flags() {
        let filter = RecipeFilter::parse("is_favorited=1&is_in_shopping_cart=true");
        assert!(filter.is_favorited);
        assert!(filter.is_in_shopping_cart);

        let filter = RecipeFilter::parse("is_favorited=0&is_in_shopping_cart=false");
        assert!(!filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }

    #[test]
    fn page_defaults_and_clamping() {
        let page = PageQuery::parse("");
        assert_eq!(page, PageQuery { page: 1, limit: 6 });

        let page = PageQuery::parse("page=0&limit=100000");
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, MAX_PAGE_SIZE);

        let page = PageQuery::parse("page=3&limit=2");
        assert_eq!(page.offset(), 4);
    }

    #[test]
    fn decodes_percent_and_plus() {
        let filter = IngredientFilter::parse("name=olive+oil%2c+extra");
        assert_eq!(filter.name.as_deref(), Some("olive oil, extra"));
    }

    #[test]
    fn recipes_limit_must_be_non_negative() {
        let query = SubscriptionQuery::parse("recipes_limit=2");
        assert_eq!(query.recipes_limit, Some(2));

        let query = SubscriptionQuery::parse("recipes_limit=-1");
        assert_eq!(query.recipes_limit, None);
    }
}
