use reddit_client::types::ACCOUNT_KIND;
use reddit_client::{Comment, Redditor, Submission};
use timelapse_common::FieldValue;

use super::{Accessor, Attr, Projectable};

pub(super) fn names<T>(table: &[(&'static str, Accessor<T>)]) -> Vec<&'static str> {
    table.iter().map(|(name, _)| *name).collect()
}

fn lookup<T>(table: &[(&'static str, Accessor<T>)], item: &T, name: &str) -> Option<Attr> {
    table
        .iter()
        .find(|(attr, _)| *attr == name)
        .map(|(_, accessor)| accessor(item))
}

/// Reddit timestamps are whole seconds carried as floats.
fn epoch(secs: f64) -> FieldValue {
    FieldValue::Int(secs.trunc() as i64)
}

// ---------------------------------------------------------------------------
// Nested objects
// ---------------------------------------------------------------------------

/// The author of a submission or comment, as far as the listing reveals it.
#[derive(Debug, Clone)]
pub struct AuthorRef {
    pub name: String,
    pub fullname: Option<String>,
}

impl AuthorRef {
    fn from_parts(name: &Option<String>, fullname: &Option<String>) -> Option<Self> {
        name.as_ref().map(|name| Self {
            name: name.clone(),
            fullname: fullname.clone(),
        })
    }
}

static AUTHOR_ATTRS: &[(&str, Accessor<AuthorRef>)] = &[
    ("name", |a| Attr::value(a.name.clone())),
    ("fullname", |a| Attr::value(a.fullname.clone())),
    ("id", |a| {
        Attr::value(
            a.fullname
                .as_deref()
                .and_then(|f| f.strip_prefix(ACCOUNT_KIND))
                .and_then(|f| f.strip_prefix('_'))
                .map(str::to_string),
        )
    }),
];

impl Projectable for AuthorRef {
    fn kind(&self) -> &'static str {
        "redditor"
    }

    fn attr(&self, name: &str) -> Option<Attr> {
        lookup(AUTHOR_ATTRS, self, name)
    }

    fn scalar(&self) -> FieldValue {
        FieldValue::Text(self.name.clone())
    }
}

/// The subreddit a submission or comment was posted to.
#[derive(Debug, Clone)]
pub struct SubredditRef {
    pub display_name: String,
    pub fullname: Option<String>,
    pub subscribers: Option<i64>,
}

impl SubredditRef {
    fn from_parts(
        display_name: &Option<String>,
        fullname: &Option<String>,
        subscribers: Option<i64>,
    ) -> Option<Self> {
        display_name.as_ref().map(|name| Self {
            display_name: name.clone(),
            fullname: fullname.clone(),
            subscribers,
        })
    }
}

static SUBREDDIT_ATTRS: &[(&str, Accessor<SubredditRef>)] = &[
    ("display_name", |s| Attr::value(s.display_name.clone())),
    ("fullname", |s| Attr::value(s.fullname.clone())),
    ("id", |s| {
        Attr::value(
            s.fullname
                .as_deref()
                .and_then(|f| f.split_once('_'))
                .map(|(_, id)| id.to_string()),
        )
    }),
    ("subscribers", |s| Attr::value(s.subscribers)),
];

impl Projectable for SubredditRef {
    fn kind(&self) -> &'static str {
        "subreddit"
    }

    fn attr(&self, name: &str) -> Option<Attr> {
        lookup(SUBREDDIT_ATTRS, self, name)
    }

    fn scalar(&self) -> FieldValue {
        FieldValue::Text(self.display_name.clone())
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

pub(super) static SUBMISSION_ATTRS: &[(&str, Accessor<Submission>)] = &[
    ("id", |s| Attr::value(s.id.clone())),
    ("fullname", |s| Attr::value(s.name.clone())),
    ("name", |s| Attr::value(s.name.clone())),
    ("created_utc", |s| Attr::Value(epoch(s.created_utc))),
    ("title", |s| Attr::value(s.title.clone())),
    ("selftext", |s| Attr::value(s.selftext.clone())),
    ("author", |s| {
        Attr::node(AuthorRef::from_parts(&s.author, &s.author_fullname))
    }),
    ("subreddit", |s| {
        Attr::node(SubredditRef::from_parts(
            &s.subreddit,
            &s.subreddit_id,
            s.subreddit_subscribers,
        ))
    }),
    ("score", |s| Attr::value(s.score)),
    ("ups", |s| Attr::value(s.ups)),
    ("downs", |s| Attr::value(s.downs)),
    ("upvote_ratio", |s| Attr::value(s.upvote_ratio)),
    ("num_comments", |s| Attr::value(s.num_comments)),
    ("num_crossposts", |s| Attr::value(s.num_crossposts)),
    ("total_awards_received", |s| Attr::value(s.total_awards_received)),
    ("permalink", |s| Attr::value(s.permalink.clone())),
    ("url", |s| Attr::value(s.url.clone())),
    ("domain", |s| Attr::value(s.domain.clone())),
    ("link_flair_text", |s| Attr::value(s.link_flair_text.clone())),
    ("is_self", |s| Attr::value(s.is_self)),
    ("is_video", |s| Attr::value(s.is_video)),
    ("over_18", |s| Attr::value(s.over_18)),
    ("spoiler", |s| Attr::value(s.spoiler)),
    ("stickied", |s| Attr::value(s.stickied)),
    ("locked", |s| Attr::value(s.locked)),
    ("removed_by_category", |s| Attr::value(s.removed_by_category.clone())),
];

impl Projectable for Submission {
    fn kind(&self) -> &'static str {
        "submission"
    }

    fn attr(&self, name: &str) -> Option<Attr> {
        lookup(SUBMISSION_ATTRS, self, name)
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

pub(super) static COMMENT_ATTRS: &[(&str, Accessor<Comment>)] = &[
    ("id", |c| Attr::value(c.id.clone())),
    ("fullname", |c| Attr::value(c.name.clone())),
    ("name", |c| Attr::value(c.name.clone())),
    ("created_utc", |c| Attr::Value(epoch(c.created_utc))),
    ("body", |c| Attr::value(c.body.clone())),
    ("author", |c| {
        Attr::node(AuthorRef::from_parts(&c.author, &c.author_fullname))
    }),
    ("subreddit", |c| {
        Attr::node(SubredditRef::from_parts(&c.subreddit, &c.subreddit_id, None))
    }),
    ("link_id", |c| Attr::value(c.link_id.clone())),
    ("parent_id", |c| Attr::value(c.parent_id.clone())),
    ("score", |c| Attr::value(c.score)),
    ("controversiality", |c| Attr::value(c.controversiality)),
    ("permalink", |c| Attr::value(c.permalink.clone())),
    ("is_submitter", |c| Attr::value(c.is_submitter)),
    ("stickied", |c| Attr::value(c.stickied)),
];

impl Projectable for Comment {
    fn kind(&self) -> &'static str {
        "comment"
    }

    fn attr(&self, name: &str) -> Option<Attr> {
        lookup(COMMENT_ATTRS, self, name)
    }
}

// ---------------------------------------------------------------------------
// Redditor
// ---------------------------------------------------------------------------

pub(super) static REDDITOR_ATTRS: &[(&str, Accessor<Redditor>)] = &[
    ("id", |r| Attr::value(r.id.clone())),
    ("name", |r| Attr::value(r.name.clone())),
    ("fullname", |r| Attr::value(r.fullname())),
    ("created_utc", |r| Attr::Value(r.created_utc.map(epoch).unwrap_or_default())),
    ("link_karma", |r| Attr::value(r.link_karma)),
    ("comment_karma", |r| Attr::value(r.comment_karma)),
    ("total_karma", |r| Attr::value(r.total_karma)),
    ("is_mod", |r| Attr::value(r.is_mod)),
    ("is_gold", |r| Attr::value(r.is_gold)),
    ("is_employee", |r| Attr::value(r.is_employee)),
    ("verified", |r| Attr::value(r.verified)),
    ("has_verified_email", |r| Attr::value(r.has_verified_email)),
];

impl Projectable for Redditor {
    fn kind(&self) -> &'static str {
        "redditor"
    }

    fn attr(&self, name: &str) -> Option<Attr> {
        lookup(REDDITOR_ATTRS, self, name)
    }

    fn scalar(&self) -> FieldValue {
        FieldValue::Text(self.name.clone())
    }
}
