use std::collections::BTreeMap;

use core_types::UiLanguage;

#[derive(Debug, Clone)]
pub struct I18n {
    lang: UiLanguage,
    zh_cn: BTreeMap<&'static str, &'static str>,
    en_us: BTreeMap<&'static str, &'static str>,
}

impl I18n {
    pub fn new(lang: UiLanguage) -> Self {
        Self {
            lang,
            zh_cn: zh_cn_map(),
            en_us: en_us_map(),
        }
    }

    pub fn set_language(&mut self, lang: UiLanguage) {
        self.lang = lang;
    }

    pub fn t<'a>(&'a self, key: &'a str) -> &'a str {
        match self.lang {
            UiLanguage::ZhCn => self
                .zh_cn
                .get(key)
                .copied()
                .or_else(|| self.en_us.get(key).copied())
                .unwrap_or(key),
            UiLanguage::EnUs => self
                .en_us
                .get(key)
                .copied()
                .or_else(|| self.zh_cn.get(key).copied())
                .unwrap_or(key),
        }
    }

    /// Translate `key` and substitute `{name}` placeholders.
    pub fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        args.iter()
            .fold(self.t(key).to_string(), |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            })
    }
}

fn zh_cn_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("app.title", "Docent 文档问答"),
        ("nav.chat", "问答"),
        ("nav.documents", "知识库"),
        ("status.connected", "已连接"),
        ("status.disconnected", "未连接"),
        ("status.backend_version", "后端版本 {version}"),
        ("connection.banner", "无法连接后端服务：{error}"),
        ("connection.retry", "重试"),
        ("chat.welcome.title", "欢迎使用 Docent"),
        ("chat.welcome.body", "上传文档后即可就其内容提问。"),
        ("chat.placeholder", "输入问题后按 Enter 发送"),
        ("chat.send", "发送"),
        ("chat.clear", "清空会话"),
        ("chat.thinking", "思考中…"),
        ("chat.sources", "来源"),
        ("chat.processing_time", "处理耗时：{latency}"),
        ("documents.title", "知识库"),
        ("documents.refresh", "刷新"),
        ("documents.loading", "加载中…"),
        ("documents.empty", "尚未上传任何文档"),
        ("documents.stats.documents", "文档"),
        ("documents.stats.chunks", "分块"),
        ("documents.stats.types", "类型"),
        ("documents.meta", "{chunks} 个分块 • {size} • {date}"),
        ("documents.delete", "删除"),
        ("documents.delete.confirm", "确定要删除“{filename}”吗？"),
        ("documents.delete.confirm_yes", "删除"),
        ("documents.delete.confirm_no", "取消"),
        ("documents.delete.failed", "删除文档失败，请重试。"),
        ("upload.hint", "将文件拖放到此处，或点击选择文件"),
        ("upload.browse", "选择文件"),
        ("upload.supported", "支持 PDF、TXT、MD、DOCX 文件"),
        ("upload.uploading", "正在上传并处理…"),
        ("upload.failed", "上传失败：{error}"),
        ("upload.unlisted_type", "{filename} 不在支持的类型中，是否接受由服务端决定"),
    ])
}

fn en_us_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("app.title", "Docent Document Q&A"),
        ("nav.chat", "Chat"),
        ("nav.documents", "Documents"),
        ("status.connected", "Connected"),
        ("status.disconnected", "Disconnected"),
        ("status.backend_version", "Backend {version}"),
        ("connection.banner", "Cannot reach the backend: {error}"),
        ("connection.retry", "Retry"),
        ("chat.welcome.title", "Welcome to Docent"),
        (
            "chat.welcome.body",
            "Upload documents and ask questions about their content.",
        ),
        ("chat.placeholder", "Type a question and press Enter"),
        ("chat.send", "Send"),
        ("chat.clear", "Clear chat"),
        ("chat.thinking", "Thinking…"),
        ("chat.sources", "Sources"),
        ("chat.processing_time", "Processing time: {latency}"),
        ("documents.title", "Knowledge Base"),
        ("documents.refresh", "Refresh"),
        ("documents.loading", "Loading…"),
        ("documents.empty", "No documents uploaded yet"),
        ("documents.stats.documents", "Documents"),
        ("documents.stats.chunks", "Chunks"),
        ("documents.stats.types", "Types"),
        ("documents.meta", "{chunks} chunks • {size} • {date}"),
        ("documents.delete", "Delete"),
        (
            "documents.delete.confirm",
            "Are you sure you want to delete \"{filename}\"?",
        ),
        ("documents.delete.confirm_yes", "Delete"),
        ("documents.delete.confirm_no", "Cancel"),
        (
            "documents.delete.failed",
            "Error deleting document. Please try again.",
        ),
        ("upload.hint", "Drag and drop files here, or browse"),
        ("upload.browse", "Browse"),
        ("upload.supported", "Supports PDF, TXT, MD, DOCX files"),
        ("upload.uploading", "Uploading and processing…"),
        ("upload.failed", "Upload failed: {error}"),
        (
            "upload.unlisted_type",
            "{filename} is not a listed type; the backend decides whether to accept it",
        ),
    ])
}
