use super::types::AllocationComponents;

pub const LEVERAGE_DISCLOSURES: [&str; 5] = [
    "Borrowing spread reduces effective risk premium: The leveraged allocation uses \
     mu - r_b rather than mu - r, so the optimal leveraged equity share is always lower \
     than frictionless theory suggests.",
    "Margin calls and forced deleveraging: Real-world margin lending can force liquidation \
     at market troughs, creating procyclical risk not captured by this static model.",
    "Amplified volatility and tail risk: Leverage scales both returns and losses. Under \
     non-normal return distributions, the realized downside can be substantially worse \
     than the Gaussian model implies.",
    "Tax treatment of margin interest: Deductibility of margin interest varies by \
     jurisdiction and investor situation; the model does not account for this.",
    "Volatility drag under discrete rebalancing: The model assumes continuous rebalancing. \
     In practice, discrete rebalancing under leverage introduces volatility drag that \
     reduces compound returns.",
];

pub const DISCLAIMER: &str =
    "Disclaimer: This is for education and research purposes only. It is not investment advice.";

pub fn format_currency(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub fn needs_leverage_disclosures(c: &AllocationComponents) -> bool {
    c.leverage_applied || c.alpha_unconstrained > 1.0
}

pub fn build_explanation(c: &AllocationComponents) -> String {
    let mut lines = vec![
        "=== Lifecycle Allocation Explanation ===".to_string(),
        String::new(),
        format!("Financial wealth (W): {}", format_currency(c.investable_wealth)),
        format!("Human capital (H):    {}", format_currency(c.human_capital)),
        format!(
            "Total wealth (W+H):   {}",
            format_currency(c.investable_wealth + c.human_capital)
        ),
        format!("H/W ratio:            {:.2}", c.hw_ratio),
        String::new(),
        format!(
            "Risk aversion (gamma): {:.2} ({} terms)",
            c.gamma,
            if c.real { "real" } else { "nominal" }
        ),
        format!("Baseline risky share (alpha*): {}", format_percent(c.alpha_star)),
    ];

    if c.borrowing_cost_drag > 0.0 {
        lines.push(format!(
            "Borrowing spread drag on alpha*: {}",
            format_percent(c.borrowing_cost_drag)
        ));
    }

    if c.hw_ratio > 0.0 {
        lines.push(format!(
            "Human capital adjustment: alpha* x (1 + H/W) = {} x (1 + {:.2}) = {}",
            format_percent(c.alpha_star),
            c.hw_ratio,
            format_percent(c.alpha_unconstrained)
        ));
    } else {
        lines.push("No human capital adjustment (H = 0).".to_string());
    }

    if c.alpha_unconstrained != c.alpha_recommended {
        lines.push(format!(
            "After constraints [{}, {}]: {}",
            format_percent(c.lower_bound),
            format_percent(c.upper_bound),
            format_percent(c.alpha_recommended)
        ));
    } else {
        lines.push(format!(
            "Recommended stock allocation: {}",
            format_percent(c.alpha_recommended)
        ));
    }

    if needs_leverage_disclosures(c) {
        lines.push(String::new());
        lines.push("--- Leverage Risk Disclosures ---".to_string());
        for (i, disclosure) in LEVERAGE_DISCLOSURES.iter().enumerate() {
            lines.push(format!("{}. {disclosure}", i + 1));
        }
    }

    lines.push(String::new());
    lines.push(DISCLAIMER.to_string());
    lines.join("\n")
}
