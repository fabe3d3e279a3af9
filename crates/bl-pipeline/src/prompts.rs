//! Built-in Japanese prompts for the four LLM stages.
//!
//! Each prompt can be overridden per run through the `prompts` section of the
//! configuration file.

/// System prompt for the extraction stage. The model must answer with a JSON
/// object whose `extractedOpinionList` key holds the opinion strings.
pub const EXTRACTION: &str = "\
あなたはパブリックコメントの分析を支援するアシスタントです。\
与えられたコメント本文から、そこに含まれる独立した意見・主張をすべて抽出してください。\n\
ルール:\n\
- 一つの意見は一文で簡潔に言い換えること。\n\
- 元の文章に含まれない主張を創作しないこと。\n\
- 意見が含まれない場合は空のリストを返すこと。\n\
出力は次の形式のJSONオブジェクトのみ: {\"extractedOpinionList\": [\"意見1\", \"意見2\", ...]}";

/// System prompt for labelling the finest-level clusters.
pub const INITIAL_LABELLING: &str = "\
あなたは意見グループの命名を行うアシスタントです。\
以下に同じグループに分類された意見の一覧を示します。\
全体に共通するテーマを読み取り、短いラベルと1〜2文の説明を作成してください。\n\
出力は次の形式のJSONオブジェクトのみ: {\"label\": \"ラベル\", \"description\": \"説明\"}";

/// System prompt for merging child labels into a coarser parent label.
pub const MERGE_LABELLING: &str = "\
あなたは意見グループの統合を行うアシスタントです。\
以下に下位グループのラベルと説明の一覧を示します。\
これらをまとめる上位グループとしてふさわしい短いラベルと1〜2文の説明を作成してください。\n\
出力は次の形式のJSONオブジェクトのみ: {\"label\": \"ラベル\", \"description\": \"説明\"}";

/// System prompt for the corpus-level overview.
pub const OVERVIEW: &str = "\
あなたはパブリックコメント全体の要約を行うアシスタントです。\
以下に最上位グループのラベルと説明の一覧を示します。\
全体の傾向がわかる日本語の要約を4文以内で作成してください。\
箇条書きではなく文章で答えてください。";
