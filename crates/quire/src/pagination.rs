use crate::types::Post;

/// Which posts a paginated listing draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis<'a> {
    All,
    Category(&'a str),
}

impl Axis<'_> {
    pub fn selects(&self, post: &Post) -> bool {
        match self {
            Axis::All => true,
            Axis::Category(category) => post.in_category(category),
        }
    }
}

/// Filters `posts` by `axis` and cuts the result into pages of `per_page`
/// posts, keeping input order. The last page may be short. A `per_page` of
/// zero puts everything on one page. No posts means no pages.
pub fn divide_posts<'p, I>(posts: I, per_page: usize, axis: Axis<'_>) -> Vec<Vec<&'p Post>>
where
    I: IntoIterator<Item = &'p Post>,
{
    let selected: Vec<&Post> = posts.into_iter().filter(|post| axis.selects(post)).collect();

    if selected.is_empty() {
        return Vec::new();
    }

    let size = if per_page == 0 {
        selected.len()
    } else {
        per_page
    };

    selected.chunks(size).map(|page| page.to_vec()).collect()
}
