//! 来源分类 - 判断通知是否来自银行类应用
//!
//! ## 规则
//! 1. 包名精确命中注册表 → 接受，使用注册表中的标签
//! 2. 包名包含银行关键词 → 接受，标签取包名最后一段（小写）
//! 3. 其他 → 拒绝
//!
//! 匹配区分大小写。纯函数，可在任意线程调用。

use std::collections::HashMap;
use tracing::warn;

/// 已知银行应用：包名 -> 标签
pub const KNOWN_SOURCES: &[(&str, &str)] = &[
    ("com.revolut.revolut", "revolut"),
    ("com.paypal.android.p2pmobile", "paypal"),
    ("it.poste.postepay", "postepay"),
    ("com.bbva.mobile.android", "bbva"),
    ("com.latuabancaperandroid", "intesa"),
    ("it.bnl.apps.banking", "bnl"),
    ("it.nogood.container", "unicredit"),
    ("eu.unicredit.mobile", "unicredit"),
    ("it.unicredit.mobile", "unicredit"),
    ("com.unicredit.euromobile", "unicredit"),
    ("com.unicredit", "unicredit"),
];

/// 兜底关键词（未注册的银行应用）
pub const BANK_KEYWORDS: &[&str] = &[
    "bank", "unicredit", "revolut", "paypal", "poste", "bbva", "intesa", "bnl",
];

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub accepted: bool,
    pub label: String,
}

impl Classification {
    fn accept(label: impl Into<String>) -> Self {
        Self {
            accepted: true,
            label: label.into(),
        }
    }

    fn reject() -> Self {
        Self {
            accepted: false,
            label: String::new(),
        }
    }
}

/// 来源分类器
#[derive(Debug, Clone)]
pub struct Classifier {
    registry: HashMap<String, String>,
    keywords: Vec<String>,
    keyword_heuristic: bool,
}

impl Classifier {
    /// 使用内置注册表和关键词创建
    pub fn new() -> Self {
        Self {
            registry: KNOWN_SOURCES
                .iter()
                .map(|(pkg, label)| (pkg.to_string(), label.to_string()))
                .collect(),
            keywords: BANK_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            keyword_heuristic: true,
        }
    }

    /// 注册额外来源
    pub fn with_source(mut self, source_id: impl Into<String>, label: impl Into<String>) -> Self {
        self.registry.insert(source_id.into(), label.into());
        self
    }

    /// 开关关键词兜底匹配
    pub fn with_keyword_heuristic(mut self, enabled: bool) -> Self {
        self.keyword_heuristic = enabled;
        self
    }

    /// 分类
    pub fn classify(&self, source_id: &str) -> Classification {
        if let Some(label) = self.registry.get(source_id) {
            return Classification::accept(label.clone());
        }

        if self.keyword_heuristic && self.matches_keyword(source_id) {
            let label = derive_label(source_id);
            warn!(
                source = %source_id,
                label = %label,
                "Unknown bank package detected (processing anyway)"
            );
            return Classification::accept(label);
        }

        Classification::reject()
    }

    /// 是否命中关键词
    fn matches_keyword(&self, source_id: &str) -> bool {
        self.keywords.iter().any(|k| source_id.contains(k.as_str()))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

/// 取包名最后一个非空段作为标签
fn derive_label(source_id: &str) -> String {
    source_id
        .rsplit('.')
        .find(|segment| !segment.is_empty())
        .unwrap_or(source_id)
        .to_lowercase()
}
