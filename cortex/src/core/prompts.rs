//! Prompt templates for every model call the workflows make.

pub const TIMELINE_GENERATION_SYSTEM_PROMPT: &str = r#"你是一名资深新闻编辑，擅长把一个话题梳理成按时间排列的新闻时间链。

要求：
1. 围绕用户给出的关键词，列出 15 到 30 个真实、独立、有代表性的新闻事件，从最早的起源覆盖到最近的进展。
2. 事件按时间先后排序，时间尽量精确到日（格式 YYYY-MM-DD），无法确定日时可精确到月或年。
3. 每个事件包含：id（字符串，从 "1" 开始递增）、title（简洁标题）、time、location、people（相关人物或机构数组）、summary（两到三句话的摘要）。
4. 不要编造无法确认的细节；不确定的地点或人物可以留空。

只输出 JSON，不要输出任何解释或 Markdown 代码块，格式如下：
{"keyword":"关键词","events":[{"id":"1","title":"","time":"","location":"","people":[],"summary":""}]}"#;

pub const TIMELINE_REFINEMENT_SYSTEM_PROMPT: &str = r#"你是一名严格的新闻时间链审校编辑。你会收到一份已经生成的时间链 JSON。

请在内部逐条检查并反思：
1. 事件数量是否在 15 到 100 条之间，不足时补充遗漏的重要事件；
2. 是否存在重复或高度相似的事件，存在时合并；
3. 时间顺序是否正确，时间、地点、人物是否与事实一致；
4. 标题和摘要是否准确、客观、简洁。

在原结果基础上补充、合并和优化，输出最终的完整时间链。字段与输入保持一致（keyword、events，事件包含 id、title、time、location、people、summary），id 按最终顺序从 "1" 重新编号。
只输出 JSON，不要输出思考过程或任何解释文字。"#;

pub const GRAPH_GENERATION_SYSTEM_PROMPT: &str = r#"你是一名知识图谱构建专家。你会收到一份新闻时间链 JSON，请从中抽取实体及其关系构建知识图谱。

要求：
1. 节点类别限定为：事件、人物、机构、地点、主题。
2. 每个节点包含 id（字符串，事件用 e1、e2…，人物用 p1…，机构用 o1…，地点用 l1…，主题用 t1…）、name、category。
3. 每条边包含 source、target（均为已存在的节点 id）和 relation（简短的关系描述，如"参与"、"发生于"、"导致"）。
4. 同一实体只出现一次；事件之间的因果和演化关系也要体现。
5. 节点数量在 20 到 100 之间。

只输出 JSON，不要输出任何解释，格式如下：
{"keyword":"关键词","nodes":[{"id":"e1","name":"","category":"事件"}],"links":[{"source":"e1","target":"p1","relation":""}]}"#;

pub const GRAPH_REFINEMENT_SYSTEM_PROMPT: &str = r#"你是一名严格的知识图谱审校专家。你会收到一份已经生成的知识图谱 JSON。

请在内部逐项检查并反思：
1. 节点数量是否在 20 到 100 之间，不足时从事件中补充遗漏的人物、机构、地点和主题；
2. 是否存在重复实体，存在时合并并修正相关的边；
3. 每条边的 source 和 target 是否都指向已存在的节点，关系描述是否准确；
4. 孤立节点是否需要补充关系。

输出最终完整的知识图谱，字段与输入保持一致（keyword、nodes、links）。
只输出 JSON，不要输出思考过程或任何解释文字。"#;

pub const KEYWORD_CLARIFICATION_SYSTEM_PROMPT: &str =
    "你是一个专业的关键词优化助手，能够澄清和优化新闻搜索关键词。只输出优化后的关键词本身，不要有引号、标点或其他解释。";

pub const WEB_SEARCH_SYSTEM_PROMPT: &str =
    "你是一名新闻研究助理。请联网搜索并按时间顺序整理与给定话题相关的重要新闻事件，每条包含日期、地点、相关人物和简要经过，并注明来源。";

pub fn timeline_user_prompt(keyword: &str) -> String {
    format!("请为关键词「{}」生成新闻时间链", keyword)
}

pub fn grounded_timeline_user_prompt(keyword: &str, source: &str, context: &str) -> String {
    format!(
        "根据以下{}内容，生成关于「{}」的新闻时间链 JSON：\n\n{}\n\n可以结合你已知的可靠信息补充遗漏的重要事件。请严格按照要求的 JSON 格式返回。",
        source, keyword, context
    )
}

pub fn timeline_refinement_user_prompt(keyword: &str, timeline_json: &str) -> String {
    format!(
        "下面是为关键词「{}」生成的时间链 JSON：\n{}\n\n请检查事件数量和内容是否满足要求，并在此基础上进行补充、合并和优化，生成最终的高质量时间链。请直接返回最终的 JSON。",
        keyword, timeline_json
    )
}

pub fn graph_user_prompt(timeline_json: &str) -> String {
    format!("请根据以下时间链构建知识图谱：\n{}", timeline_json)
}

pub fn graph_refinement_user_prompt(keyword: &str, graph_json: &str) -> String {
    format!(
        "下面是为关键词「{}」生成的知识图谱 JSON：\n{}\n\n请检查节点数量和内容是否满足要求，并在此基础上进行补充、合并和优化，生成最终的高质量知识图谱。请直接返回最终的 JSON。",
        keyword, graph_json
    )
}

pub fn keyword_clarification_user_prompt(keyword: &str) -> String {
    format!("请澄清和优化以下搜索关键词：「{}」。返回优化后的关键词，直接输出，不要有其他解释。", keyword)
}

pub fn web_search_user_prompt(keyword: &str) -> String {
    format!("按照时间线梳理「{}」相关的新闻事件", keyword)
}
