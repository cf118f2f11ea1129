//! Prompt templates
//!
//! All prompts are Vietnamese MiniJinja templates compiled once into a
//! shared [`Environment`]. JSON schemas for structured replies are appended
//! by the chains themselves, not here.

use crate::error::Result;
use chrono::NaiveDate;
use minijinja::{Environment, context};
use serde::Serialize;

/// A worked decomposition shown to the model
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DecompositionExample {
    pub query: &'static str,
    /// At least two entries, like every valid decomposition
    pub sub_queries: &'static [&'static str],
    pub reasoning: &'static str,
}

/// Worked examples embedded in the decomposer prompt
pub const DECOMPOSITION_EXAMPLES: &[DecompositionExample] = &[
    DecompositionExample {
        query: "So sánh hiệu suất VIC và VHM trong 3 tháng qua",
        sub_queries: &[
            "Tính SMA của VIC, VHM trong 3 tháng qua",
            "Tính RSI của VIC, VHM trong 3 tháng qua",
        ],
        reasoning: "Câu hỏi yêu cầu tính toán 2 chỉ số khác nhau, cần phân tách để giải quyết.",
    },
    DecompositionExample {
        query: "Danh sách cổ đông lớn và ban lãnh đạo của VCB và TCB",
        sub_queries: &[
            "Danh sách cổ đông lớn của VCB và TCB",
            "Danh sách ban lãnh đạo đang làm việc của VCB và TCB",
        ],
        reasoning: "Câu hỏi cần 2 công cụ khác nhau; mỗi công cụ nhận được nhiều mã cùng lúc nên \
                    VCB và TCB được gộp trong cùng một câu hỏi con.",
    },
    DecompositionExample {
        query: "So sánh khối lượng giao dịch và RSI của VIC với HPG trong 2 tuần gần đây",
        sub_queries: &[
            "Tính tổng khối lượng giao dịch của VIC, HPG trong 2 tuần gần đây",
            "Tính RSI của VIC, HPG trong 2 tuần gần đây",
        ],
        reasoning: "Câu hỏi cần 2 công cụ khác nhau; VIC và HPG dùng chung một lần gọi công cụ \
                    nên không tách theo mã cổ phiếu.",
    },
    DecompositionExample {
        query: "Danh sách ban lãnh đạo đang làm việc của VCB và các công ty con thuộc VCB",
        sub_queries: &[
            "Danh sách ban lãnh đạo đang làm việc của VCB",
            "Danh sách các công ty con thuộc VCB",
        ],
        reasoning: "Câu hỏi yêu cầu sử dụng 2 công cụ khác nhau, cần phân tách để giải quyết.",
    },
    DecompositionExample {
        query: "Tính cho tôi SMA9 và SMA20 của mã VIC trong 2 tháng với timeframe 1d",
        sub_queries: &[
            "Tính SMA9 của VIC trong 2 tháng với timeframe 1D",
            "Tính SMA20 của VIC trong 2 tháng với timeframe 1D",
        ],
        reasoning: "Câu hỏi yêu cầu tính 1 chỉ số 2 lần với cấu hình khác nhau, cần phân tách để giải quyết.",
    },
];

/// Compiled prompt templates
pub struct Prompts {
    env: Environment<'static>,
}

impl Prompts {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("agent_system", include_str!("templates/agent_system.j2"))?;
        env.add_template(
            "classifier_system",
            include_str!("templates/classifier_system.j2"),
        )?;
        env.add_template("classifier_user", "Phân loại câu hỏi sau: {{ query }}")?;
        env.add_template(
            "decomposer_system",
            include_str!("templates/decomposer_system.j2"),
        )?;
        env.add_template("decomposer_user", "Phân tách câu hỏi sau: {{ query }}")?;
        env.add_template("combiner_system", include_str!("templates/combiner_system.j2"))?;
        env.add_template("combiner_user", include_str!("templates/combiner_user.j2"))?;
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        Ok(self.env.get_template(name)?.render(ctx)?)
    }

    /// Agent system prompt for a given local date
    pub fn agent_system(&self, today: NaiveDate) -> Result<String> {
        self.render(
            "agent_system",
            context! { today => today.format("%Y-%m-%d").to_string() },
        )
    }

    /// Classifier system prompt listing the available tools
    pub fn classifier_system(&self, tools: &[String]) -> Result<String> {
        self.render("classifier_system", context! { tools })
    }

    pub fn classifier_user(&self, query: &str) -> Result<String> {
        self.render("classifier_user", context! { query })
    }

    pub fn decomposer_system(&self) -> Result<String> {
        self.render(
            "decomposer_system",
            context! { examples => DECOMPOSITION_EXAMPLES },
        )
    }

    pub fn decomposer_user(&self, query: &str) -> Result<String> {
        self.render("decomposer_user", context! { query })
    }

    pub fn combiner_system(&self) -> Result<String> {
        self.render("combiner_system", context! {})
    }

    /// `results` is the pre-formatted block of sub-answers
    pub fn combiner_user(&self, original_query: &str, results: &str) -> Result<String> {
        self.render("combiner_user", context! { original_query, results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_prompt_carries_date() {
        let prompts = Prompts::new().unwrap();
        let rendered = prompts
            .agent_system(NaiveDate::from_ymd_opt(2025, 11, 13).unwrap())
            .unwrap();
        assert!(rendered.contains("Hôm nay là ngày 2025-11-13"));
    }

    #[test]
    fn test_decomposer_prompt_lists_examples() {
        let prompts = Prompts::new().unwrap();
        let rendered = prompts.decomposer_system().unwrap();
        assert!(rendered.contains("Ví dụ 5:"));
        assert!(rendered.contains("1. \"Tính SMA9 của VIC trong 2 tháng với timeframe 1D\""));
        assert!(rendered.contains("1. \"Danh sách cổ đông lớn của VCB và TCB\""));
        assert!(!rendered.contains("Không phân tách câu hỏi"));
    }

    #[test]
    fn test_classifier_prompt_lists_tools() {
        let prompts = Prompts::new().unwrap();
        let rendered = prompts
            .classifier_system(&["view_ohlcv: Lấy dữ liệu giá".to_string()])
            .unwrap();
        assert!(rendered.contains("- view_ohlcv: Lấy dữ liệu giá"));
        assert_eq!(
            prompts.classifier_user("Giá VCB").unwrap(),
            "Phân loại câu hỏi sau: Giá VCB"
        );
    }

    #[test]
    fn test_combiner_user_prompt() {
        let prompts = Prompts::new().unwrap();
        let rendered = prompts
            .combiner_user("So sánh SMA", "Kết quả 1:\nA\n\n")
            .unwrap();
        assert!(rendered.starts_with("Câu hỏi gốc: So sánh SMA"));
        assert!(rendered.contains("Kết quả 1:\nA"));
    }
}
