mod common;

use common::*;
use shout_bot::vote::quorum_for;
use shout_bot::{VoteCoordinator, VoteOutcome};
use std::sync::Arc;
use std::time::Duration;

fn coordinator(transport: &Arc<MockTransport>) -> VoteCoordinator {
    VoteCoordinator::new(transport.clone(), vote_window())
}

#[test]
fn test_quorum_is_forty_percent_rounded_down() {
    assert_eq!(quorum_for(0), 0);
    assert_eq!(quorum_for(1), 0);
    assert_eq!(quorum_for(25), 10);
}

#[tokio::test(start_paused = true)]
async fn test_start_announces_vote() -> anyhow::Result<()> {
    init_tracing();
    let transport = MockTransport::new(&["troll"], 25);
    let votes = coordinator(&transport);

    let outcome = votes.votekick(&message("alice", "!votekick troll"), "troll").await?;
    assert_eq!(
        outcome,
        VoteOutcome::Started { target: "troll".to_string(), required_votes: 9 }
    );

    let snapshot = votes.snapshot().await;
    assert_eq!(snapshot.target.as_deref(), Some("troll"));
    assert_eq!(snapshot.quorum, 10);
    assert_eq!(snapshot.required_votes, 9);
    assert_eq!(snapshot.voters, vec!["alice".to_string()]);

    assert_eq!(
        transport.messages(),
        vec!["alice has voted to kick troll! Type !votekick troll to cast a vote. (9 needed)".to_string()]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_target_while_running_is_rejected() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll", "bystander"], 25);
    let votes = coordinator(&transport);

    votes.votekick(&message("alice", "!votekick troll"), "troll").await?;
    let before = votes.snapshot().await;

    let outcome = votes.votekick(&message("bob", "!votekick bystander"), "bystander").await?;
    assert_eq!(outcome, VoteOutcome::InProgress { target: "troll".to_string() });

    let outcome = votes.start(&message("carol", "!votekick bystander"), "bystander", 25).await?;
    assert_eq!(outcome, VoteOutcome::InProgress { target: "troll".to_string() });

    assert_eq!(votes.snapshot().await, before);
    assert_eq!(
        transport.responses(),
        vec![
            "You cannot vote to kick another user while a vote to kick troll is in progress.".to_string(),
            "You cannot vote to kick another user while a vote to kick troll is in progress.".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_ballot_is_not_counted() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 25);
    let votes = coordinator(&transport);

    votes.votekick(&message("alice", "!votekick troll"), "troll").await?;
    let outcome = votes.votekick(&message("alice", "!votekick troll"), "troll").await?;

    assert_eq!(outcome, VoteOutcome::AlreadyVoted);
    assert_eq!(votes.snapshot().await.required_votes, 9);
    assert_eq!(transport.responses(), vec!["You cannot vote more than once!".to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_vote_passes_after_exactly_quorum_ballots() -> anyhow::Result<()> {
    // 10 participants: quorum 4, the nominator plus three more
    let transport = MockTransport::new(&["troll"], 10);
    let votes = coordinator(&transport);

    votes.votekick(&message("alice", "!votekick troll"), "troll").await?;

    let outcome = votes.votekick(&message("bob", "!votekick troll"), "troll").await?;
    assert_eq!(outcome, VoteOutcome::Counted { target: "troll".to_string(), required_votes: 2 });
    let outcome = votes.votekick(&message("carol", "!votekick troll"), "troll").await?;
    assert_eq!(outcome, VoteOutcome::Counted { target: "troll".to_string(), required_votes: 1 });
    assert!(transport.outbox().kicks.is_empty());

    let outcome = votes.votekick(&message("dave", "!votekick troll"), "troll").await?;
    assert_eq!(
        outcome,
        VoteOutcome::Passed { target: "troll".to_string(), channel: TEST_CHANNEL.to_string() }
    );

    let outbox = transport.outbox();
    assert_eq!(outbox.kicks, vec![(TEST_CHANNEL.to_string(), "troll".to_string())]);
    assert_eq!(outbox.messages.last().map(|(_, m)| m.as_str()), Some("Vote succeeded - kicking troll!"));

    let snapshot = votes.snapshot().await;
    assert!(snapshot.is_idle());
    assert_eq!(snapshot.quorum, -1);
    assert_eq!(snapshot.required_votes, -1);
    assert!(snapshot.voters.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_quorum_of_one_passes_on_nomination() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 3);
    let votes = coordinator(&transport);

    let outcome = votes.votekick(&message("alice", "!votekick troll"), "troll").await?;
    assert_eq!(
        outcome,
        VoteOutcome::Passed { target: "troll".to_string(), channel: TEST_CHANNEL.to_string() }
    );
    assert_eq!(transport.outbox().kicks.len(), 1);
    assert!(votes.snapshot().await.is_idle());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_tiny_channel_vote_only_expires() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 1);
    let votes = coordinator(&transport);

    let outcome = votes.votekick(&message("alice", "!votekick troll"), "troll").await?;
    assert_eq!(outcome, VoteOutcome::Started { target: "troll".to_string(), required_votes: 0 });

    let snapshot = votes.snapshot().await;
    assert_eq!(snapshot.target.as_deref(), Some("troll"));
    assert_eq!(snapshot.quorum, 0);

    let outcome = votes.votekick(&message("bob", "!votekick troll"), "troll").await?;
    assert_eq!(outcome, VoteOutcome::Counted { target: "troll".to_string(), required_votes: 0 });
    assert!(transport.outbox().kicks.is_empty());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(votes.snapshot().await.is_idle());
    assert!(transport.outbox().kicks.is_empty());
    assert_eq!(
        transport.messages().last().map(String::as_str),
        Some("The vote to kick troll has failed! (0 more needed)")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_vote_without_ballots_times_out() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 25);
    let votes = coordinator(&transport);

    votes.votekick(&message("alice", "!votekick troll"), "troll").await?;

    tokio::time::sleep(Duration::from_secs(30) + Duration::from_millis(1)).await;

    let snapshot = votes.snapshot().await;
    assert!(snapshot.is_idle());
    assert_eq!(snapshot.quorum, -1);
    assert_eq!(snapshot.required_votes, -1);
    assert!(snapshot.voters.is_empty());
    assert_eq!(
        transport.messages().last().map(String::as_str),
        Some("The vote to kick troll has failed! (9 more needed)")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_kick_survives_failed_announcement() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 10);
    let votes = coordinator(&transport);

    for voter in ["alice", "bob", "carol"] {
        votes.votekick(&message(voter, "!votekick troll"), "troll").await?;
    }
    transport.fail_sends();

    let result = votes.votekick(&message("dave", "!votekick troll"), "troll").await;
    assert!(result.is_err());

    assert_eq!(transport.outbox().kicks, vec![(TEST_CHANNEL.to_string(), "troll".to_string())]);
    assert!(votes.snapshot().await.is_idle());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_votekick_after_expiry_starts_new_vote() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 25);
    let votes = coordinator(&transport);

    votes.votekick(&message("alice", "!votekick troll"), "troll").await?;
    tokio::time::sleep(Duration::from_secs(31)).await;

    let outcome = votes.votekick(&message("bob", "!votekick troll"), "troll").await?;
    assert_eq!(outcome, VoteOutcome::Started { target: "troll".to_string(), required_votes: 9 });
    assert_eq!(votes.snapshot().await.voters, vec!["bob".to_string()]);
    assert!(!transport.responses().iter().any(|r| r == "There is no vote in progress."));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_start_against_running_target_counts_ballot() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 25);
    let votes = coordinator(&transport);

    votes.start(&message("alice", "!votekick troll"), "troll", 25).await?;
    let outcome = votes.start(&message("bob", "!votekick troll"), "troll", 25).await?;

    assert_eq!(outcome, VoteOutcome::Counted { target: "troll".to_string(), required_votes: 8 });
    assert_eq!(votes.snapshot().await.voters, vec!["alice".to_string(), "bob".to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_vote_times_out() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 25);
    let votes = coordinator(&transport);

    votes.votekick(&message("alice", "!votekick troll"), "troll").await?;
    votes.votekick(&message("bob", "!votekick troll"), "troll").await?;

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(!votes.snapshot().await.is_idle());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let snapshot = votes.snapshot().await;
    assert!(snapshot.is_idle());
    assert_eq!(snapshot.quorum, -1);
    assert_eq!(snapshot.required_votes, -1);
    assert!(snapshot.voters.is_empty());

    assert_eq!(
        transport.messages().last().map(String::as_str),
        Some("The vote to kick troll has failed! (8 more needed)")
    );
    assert!(transport.outbox().kicks.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stale_timer_leaves_newer_vote_alone() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll", "spammer"], 5);
    let votes = coordinator(&transport);

    // quorum 2: passes on the second ballot, well before its timer fires
    votes.votekick(&message("alice", "!votekick troll"), "troll").await?;
    votes.votekick(&message("bob", "!votekick troll"), "troll").await?;
    assert!(votes.snapshot().await.is_idle());

    tokio::time::sleep(Duration::from_secs(20)).await;
    votes.votekick(&message("carol", "!votekick spammer"), "spammer").await?;

    // First vote's timer fires here and must not touch the second vote
    tokio::time::sleep(Duration::from_secs(15)).await;
    let snapshot = votes.snapshot().await;
    assert_eq!(snapshot.target.as_deref(), Some("spammer"));
    assert_eq!(snapshot.required_votes, 1);
    assert!(!transport.messages().iter().any(|m| m.contains("has failed")));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(votes.snapshot().await.is_idle());
    assert_eq!(
        transport.messages().last().map(String::as_str),
        Some("The vote to kick spammer has failed! (1 more needed)")
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unknown_target() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 25);
    let votes = coordinator(&transport);

    let outcome = votes.votekick(&message("alice", "!votekick ghost"), "ghost").await?;
    assert_eq!(outcome, VoteOutcome::UnknownTarget { target: "ghost".to_string() });
    assert!(votes.snapshot().await.is_idle());
    assert_eq!(transport.responses(), vec!["Cannot votekick user - user doesn't exist!".to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_ballot_without_vote() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll"], 25);
    let votes = coordinator(&transport);

    let outcome = votes.cast(&message("alice", "!votekick troll"), "troll").await?;
    assert_eq!(outcome, VoteOutcome::NoVote);
    assert_eq!(transport.responses(), vec!["There is no vote in progress.".to_string()]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_elect_one_vote() -> anyhow::Result<()> {
    let transport = MockTransport::new(&["troll", "spammer"], 25);
    let votes = Arc::new(coordinator(&transport));

    let first = {
        let votes = votes.clone();
        tokio::spawn(async move { votes.start(&message("alice", "!votekick troll"), "troll", 25).await })
    };
    let second = {
        let votes = votes.clone();
        tokio::spawn(async move { votes.start(&message("bob", "!votekick spammer"), "spammer", 25).await })
    };

    let outcomes = vec![first.await??, second.await??];
    let started: Vec<&VoteOutcome> = outcomes
        .iter()
        .filter(|o| matches!(o, VoteOutcome::Started { .. }))
        .collect();
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, VoteOutcome::InProgress { .. }))
        .count();

    assert_eq!(started.len(), 1);
    assert_eq!(rejected, 1);

    let snapshot = votes.snapshot().await;
    assert_eq!(snapshot.required_votes, 9);
    assert_eq!(snapshot.voters.len(), 1);
    Ok(())
}
