use crate::{
    ball::{BallRecord, InningsState, MatchRecord},
    config::MatchRules,
};

/// Totals recomputed from a Ball sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InningsTotals {
    /// Total runs including extras.
    pub runs: u32,
    /// Wicket deliveries.
    pub wickets: u32,
    /// Deliveries that consumed a ball slot.
    pub legal_balls: u32,
}

impl InningsTotals {
    /// True when these totals agree with the running counters of `innings`.
    pub fn matches(&self, innings: &InningsState) -> bool {
        self.runs == innings.runs
            && self.wickets == innings.wickets
            && self.legal_balls == innings.legal_balls()
    }
}

/// Folds an innings' balls into runs, wickets and legal deliveries.
pub fn fold_innings<'a>(balls: impl IntoIterator<Item = &'a BallRecord>) -> InningsTotals {
    balls.into_iter().fold(InningsTotals::default(), |mut acc, ball| {
        acc.runs += ball.total_runs();
        acc.wickets += u32::from(ball.is_wicket);
        acc.legal_balls += u32::from(ball.is_legal());
        acc
    })
}

/// Result string for a match whose two innings are complete.
///
/// The chasing side wins by wickets in hand, the defending side by runs.
pub fn result_string(record: &MatchRecord, rules: &MatchRules) -> String {
    let (Some(first), Some(second)) = (record.innings.first(), record.innings.get(1)) else {
        return "No result".to_string();
    };

    let name = |id| {
        record
            .team(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("team {id}"))
    };

    if second.runs > first.runs {
        // Target passed on the ball that took the last wicket.
        let margin = match rules.all_out_wickets().saturating_sub(second.wickets) {
            0 => "the last wicket".to_string(),
            n => plural(n, "wicket"),
        };
        format!("{} wins by {margin}", name(second.batting_team))
    } else if first.runs > second.runs {
        let margin = first.runs - second.runs;
        format!("{} wins by {}", name(first.batting_team), plural(margin, "run"))
    } else {
        "Match tied".to_string()
    }
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
