//! Solidity bindings for the contracts the relayer calls.

#![allow(missing_docs)]

use alloy::sol;

sol! {
    /// The L1 depositor of one destination chain.
    #[sol(rpc)]
    interface IL1BitcoinDepositor {
        struct BitcoinTxInfo {
            bytes4 version;
            bytes inputVector;
            bytes outputVector;
            bytes4 locktime;
        }

        struct DepositRevealInfo {
            uint32 fundingOutputIndex;
            bytes8 blindingFactor;
            bytes20 walletPubKeyHash;
            bytes20 refundPubKeyHash;
            bytes4 refundLocktime;
            address vault;
        }

        function initializeDeposit(
            BitcoinTxInfo calldata fundingTx,
            DepositRevealInfo calldata reveal,
            bytes32 l2DepositOwner
        ) external;

        function finalizeDeposit(uint256 depositKey) external payable;

        function quoteFinalizeDeposit() external view returns (uint256 cost);

        function deposits(uint256 depositKey) external view returns (uint8 state);

        event DepositInitialized(
            uint256 indexed depositKey,
            bytes32 indexed l2DepositOwner,
            address indexed l1Sender
        );

        event DepositFinalized(
            uint256 indexed depositKey,
            bytes32 indexed l2DepositOwner,
            address indexed l1Sender,
            uint256 initialAmount,
            uint256 tbtcAmount
        );

        event DepositBridged(
            uint256 indexed depositKey,
            bytes32 indexed l2Recipient,
            uint256 amount,
            uint256 nonce
        );
    }

    /// The L1 depositor in front of the StarkNet messaging bridge.
    #[sol(rpc)]
    interface IStarkNetBitcoinDepositor {
        event TBTCBridgedToStarkNet(
            bytes32 indexed depositKey,
            uint256 indexed starkNetRecipient,
            uint256 amount,
            uint256 messageNonce
        );
    }

    /// The vault that finalizes optimistic mints.
    #[sol(rpc)]
    interface ITBTCVault {
        event OptimisticMintingFinalized(
            address indexed minter,
            uint256 indexed depositKey,
            address indexed depositor,
            uint256 optimisticMintingDebt
        );
    }

    /// The L2 contract that burns tokens for a redemption.
    #[sol(rpc)]
    interface IL2BTCRedeemer {
        event RedemptionRequestedOnL2(
            bytes20 indexed walletPubKeyHash,
            uint256 amount,
            bytes redeemerOutputScript,
            bytes32 mainUtxoTxHash,
            uint32 mainUtxoOutputIndex,
            uint64 mainUtxoValue
        );
    }

    /// The L1 contract that settles redemptions requested on an L2.
    #[sol(rpc)]
    interface IL1BTCRedeemer {
        function finalizeL2Redemption(bytes calldata encodedVm) external;
    }

    /// A Wormhole token bridge.
    #[sol(rpc)]
    interface ITokenBridge {
        function isTransferCompleted(bytes32 hash) external view returns (bool completed);
    }
}
