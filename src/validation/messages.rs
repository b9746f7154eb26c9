//! Localized validation messages.

use crate::config::Locale;

/// Every input field a validator can report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    CategoryId,
    AuthorId,
    Excerpt,
    ArticleContent,
    CommentContent,
    Image,
    IsPublished,
    PublishedAt,
    ParentId,
    Email,
    Password,
    Page,
    PerPage,
    Approved,
    Status,
    Category,
    Author,
    ArticleId,
    IsLiked,
    Search,
}

impl Field {
    /// Key under which errors for this field are reported.
    pub fn key(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::CategoryId => "category_id",
            Field::AuthorId => "author_id",
            Field::Excerpt => "excerpt",
            Field::ArticleContent | Field::CommentContent => "content",
            Field::Image => "image",
            Field::IsPublished => "is_published",
            Field::PublishedAt => "published_at",
            Field::ParentId => "parent_id",
            Field::Email => "email",
            Field::Password => "password",
            Field::Page => "page",
            Field::PerPage => "per_page",
            Field::Approved => "approved",
            Field::Status => "status",
            Field::Category => "category",
            Field::Author => "author",
            Field::ArticleId => "article_id",
            Field::IsLiked => "isLiked",
            Field::Search => "search",
        }
    }

    fn label_en(self) -> &'static str {
        match self {
            Field::CategoryId => "category id",
            Field::AuthorId => "author id",
            Field::IsPublished => "is published",
            Field::PublishedAt => "published at",
            Field::ParentId => "parent id",
            Field::PerPage => "per page",
            Field::ArticleId => "article id",
            Field::IsLiked => "is liked",
            other => other.key(),
        }
    }

    fn label_ja(self) -> &'static str {
        match self {
            Field::Title => "タイトル",
            Field::CategoryId | Field::Category => "カテゴリー",
            Field::AuthorId | Field::Author => "著者",
            Field::Excerpt => "抜粋",
            Field::ArticleContent => "本文",
            Field::CommentContent => "コメント内容",
            Field::Image => "画像",
            Field::IsPublished => "公開状態",
            Field::PublishedAt => "公開日時",
            Field::ParentId => "親コメント",
            Field::Email => "メールアドレス",
            Field::Password => "パスワード",
            Field::Page => "ページ番号",
            Field::PerPage => "表示件数",
            Field::Approved => "承認状態",
            Field::Status => "ステータス",
            Field::ArticleId => "記事",
            Field::IsLiked => "いいね状態",
            Field::Search => "検索キーワード",
        }
    }
}

/// The rule a field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    MaxLength(usize),
    Exists,
    Boolean,
    Integer,
    Between(u32, u32),
    Min(u32),
    Date,
    Email,
    Image,
    ImageMax(u64),
    OneOf,
}

pub fn message(locale: Locale, field: Field, rule: Rule) -> String {
    match locale {
        Locale::En => english(field, rule),
        Locale::Ja => japanese(field, rule),
    }
}

fn english(field: Field, rule: Rule) -> String {
    let label = field.label_en();
    match rule {
        Rule::Required => format!("The {} field is required.", label),
        Rule::MaxLength(max) => format!("The {} field must not be greater than {} characters.", label, max),
        Rule::Exists | Rule::OneOf => format!("The selected {} is invalid.", label),
        Rule::Boolean => format!("The {} field must be true or false.", label),
        Rule::Integer => format!("The {} field must be an integer.", label),
        Rule::Between(min, max) => format!("The {} field must be between {} and {}.", label, min, max),
        Rule::Min(min) => format!("The {} field must be at least {}.", label, min),
        Rule::Date => format!("The {} field must be a valid date.", label),
        Rule::Email => format!("The {} field must be a valid email address.", label),
        Rule::Image => format!("The {} field must be an image.", label),
        Rule::ImageMax(kb) => format!("The {} field must not be greater than {} kilobytes.", label, kb),
    }
}

fn japanese(field: Field, rule: Rule) -> String {
    match (field, rule) {
        (Field::CategoryId, Rule::Required) => return "カテゴリーの選択は必須です。".to_string(),
        (Field::AuthorId, Rule::Required) => return "著者の選択は必須です。".to_string(),
        (Field::CommentContent, Rule::MaxLength(max)) => {
            return format!("コメントは{}文字以内で入力してください。", max)
        }
        (Field::ParentId, Rule::Exists) => return "指定された親コメントが見つかりません。".to_string(),
        (Field::Email, Rule::Required) => return "メールアドレスを入力してください。".to_string(),
        (Field::Email, Rule::Email) => return "有効なメールアドレス形式で入力してください。".to_string(),
        (Field::Password, Rule::Required) => return "パスワードを入力してください。".to_string(),
        _ => {}
    }

    let label = field.label_ja();
    match rule {
        Rule::Required => format!("{}は必須です。", label),
        Rule::MaxLength(max) => format!("{}は{}文字以内で入力してください。", label, max),
        Rule::Exists => format!("選択された{}は存在しません。", label),
        Rule::OneOf => format!("{}の値が正しくありません。", label),
        Rule::Boolean => format!("{}には true または false を指定してください。", label),
        Rule::Integer => format!("{}は整数で指定してください。", label),
        Rule::Between(min, max) => format!("{}は{}から{}の間で指定してください。", label, min, max),
        Rule::Min(min) => format!("{}は{}以上で指定してください。", label, min),
        Rule::Date => format!("{}は有効な日付で指定してください。", label),
        Rule::Email => format!("{}は有効なメールアドレス形式で入力してください。", label),
        Rule::Image => "画像ファイルを選択してください。".to_string(),
        Rule::ImageMax(kb) if kb % 1024 == 0 => format!("画像サイズは{}MB以下にしてください。", kb / 1024),
        Rule::ImageMax(kb) => format!("画像サイズは{}KB以下にしてください。", kb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Field::Title, Rule::Required, "タイトルは必須です。")]
    #[case(Field::Title, Rule::MaxLength(255), "タイトルは255文字以内で入力してください。")]
    #[case(Field::CategoryId, Rule::Exists, "選択されたカテゴリーは存在しません。")]
    #[case(Field::CommentContent, Rule::Required, "コメント内容は必須です。")]
    #[case(Field::CommentContent, Rule::MaxLength(1000), "コメントは1000文字以内で入力してください。")]
    #[case(Field::Image, Rule::ImageMax(2048), "画像サイズは2MB以下にしてください。")]
    fn japanese_messages(#[case] field: Field, #[case] rule: Rule, #[case] expected: &str) {
        assert_eq!(message(Locale::Ja, field, rule), expected);
    }

    #[rstest]
    fn english_messages_use_spaced_labels() {
        assert_eq!(
            message(Locale::En, Field::CategoryId, Rule::Required),
            "The category id field is required."
        );
        assert_eq!(
            message(Locale::En, Field::PerPage, Rule::Between(1, 100)),
            "The per page field must be between 1 and 100."
        );
    }
}
